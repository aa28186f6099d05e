// SPDX-License-Identifier: MIT
//
// Outbound ANSI: escape sequence generation, stripping, and display width.
//
// The writer functions are pure: they encode one terminal command into any
// `impl Write` and leave decisions about when to emit to the surface. All
// cursor positions are 0-indexed in our API and converted to the terminal's
// 1-indexed coordinates here.
//
// `strip_ansi` is the inverse direction for text that is about to be
// measured or logged: it removes every escape sequence, including malformed
// or unterminated ones, so the result never contains ESC.
use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

// ─── Colors ──────────────────────────────────────────────────────────────────

/// A 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceived brightness below the midpoint (Rec. 601 luma).
    ///
    /// Handy for picking a foreground once the background is known.
    #[must_use]
    pub fn is_dark(self) -> bool {
        let luma = 299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b);
        luma < 128_000
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A foreground or background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// The terminal's default color.
    #[default]
    Default,
    /// Palette index: 0–7 standard, 8–15 bright, 16–255 extended.
    Indexed(u8),
    /// 24-bit color.
    Rgb(Rgb),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const RED: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const YELLOW: Self = Self::Indexed(3);
    pub const BLUE: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const CYAN: Self = Self::Indexed(6);
    pub const WHITE: Self = Self::Indexed(7);

    /// The bright variant of a standard color (index 0–7); other colors
    /// are returned unchanged.
    #[must_use]
    pub const fn bright(self) -> Self {
        match self {
            Self::Indexed(i) if i < 8 => Self::Indexed(i + 8),
            other => other,
        }
    }

    /// Shorthand for `Color::Rgb(Rgb::new(r, g, b))`.
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(Rgb::new(r, g, b))
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Self::Rgb(rgb)
    }
}

bitflags! {
    /// SGR text attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        const BOLD      = 1 << 0;
        const DIM       = 1 << 1;
        const UNDERLINE = 1 << 2;
        const BLINK     = 1 << 3;
        const INVERSE   = 1 << 4;
    }
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` using CUP.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Move the cursor to column `x` of the current row (CHA).
#[inline]
pub fn cursor_column(w: &mut impl Write, x: u16) -> io::Result<()> {
    write!(w, "\x1b[{}G", u32::from(x) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Clear from the cursor to the end of the line (EL 0).
#[inline]
pub fn clear_to_eol(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Reset all SGR attributes and colors (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Colors and Attributes ───────────────────────────────────────────────────

/// Set the foreground color.
///
/// Compact codes for the 16 standard colors (30–37, 90–97), `38;5;n` for
/// the rest of the palette, `38;2;r;g;b` for 24-bit.
pub fn fg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"\x1b[39m"),
        Color::Indexed(idx) if idx < 8 => write!(w, "\x1b[{}m", 30 + u16::from(idx)),
        Color::Indexed(idx) if idx < 16 => write!(w, "\x1b[{}m", 82 + u16::from(idx)),
        Color::Indexed(idx) => write!(w, "\x1b[38;5;{idx}m"),
        Color::Rgb(Rgb { r, g, b }) => write!(w, "\x1b[38;2;{r};{g};{b}m"),
    }
}

/// Set the background color (40–47, 100–107, `48;5;n`, `48;2;r;g;b`).
pub fn bg(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"\x1b[49m"),
        Color::Indexed(idx) if idx < 8 => write!(w, "\x1b[{}m", 40 + u16::from(idx)),
        Color::Indexed(idx) if idx < 16 => write!(w, "\x1b[{}m", 92 + u16::from(idx)),
        Color::Indexed(idx) => write!(w, "\x1b[48;5;{idx}m"),
        Color::Rgb(Rgb { r, g, b }) => write!(w, "\x1b[48;2;{r};{g};{b}m"),
    }
}

/// Emit SGR codes for text attributes as a single CSI sequence.
///
/// Does nothing if no attributes are set.
pub fn attrs(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    const CODES: [(Attr, &[u8]); 5] = [
        (Attr::BOLD, b"1"),
        (Attr::DIM, b"2"),
        (Attr::UNDERLINE, b"4"),
        (Attr::BLINK, b"5"),
        (Attr::INVERSE, b"7"),
    ];
    if attr.is_empty() {
        return Ok(());
    }

    w.write_all(b"\x1b[")?;
    let mut first = true;
    for (flag, code) in CODES {
        if attr.contains(flag) {
            if !first {
                w.write_all(b";")?;
            }
            w.write_all(code)?;
            first = false;
        }
    }
    w.write_all(b"m")
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026).
///
/// The terminal holds back rendering until [`end_sync`], so a frame drawn
/// in several writes appears at once.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output; the terminal renders the held frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse reporting granularity. Every mode uses the SGR format (DEC 1006).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    /// Button press and release (DEC 1000).
    Click,
    /// Every motion, with or without a button held (DEC 1003).
    Track,
    /// Every motion, coordinates in pixels (DEC 1003 + 1016).
    Pixels,
}

/// Enable mouse reporting in `mode`.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode) -> io::Result<()> {
    match mode {
        MouseMode::Click => w.write_all(b"\x1b[?1000h")?,
        MouseMode::Track => w.write_all(b"\x1b[?1003h")?,
        MouseMode::Pixels => w.write_all(b"\x1b[?1003h\x1b[?1016h")?,
    }
    w.write_all(b"\x1b[?1006h")
}

/// Disable all mouse reporting.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1016l\x1b[?1006l\x1b[?1003l\x1b[?1000l")
}

/// Ask the terminal to pass shift-modified mouse events to us instead of
/// using Shift for its own selection (XTSHIFTESCAPE).
#[inline]
pub fn shift_reporting(w: &mut impl Write, on: bool) -> io::Result<()> {
    w.write_all(if on { b"\x1b[>1s" } else { b"\x1b[>0s" })
}

// ─── Bracketed Paste ────────────────────────────────────────────────────────

/// Enable bracketed paste mode (DEC 2004).
///
/// Pasted text arrives wrapped in `\x1b[200~` / `\x1b[201~`.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste mode.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Ask for the cursor position (DSR 6). The reply is `ESC [ row ; col R`.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Ask for the background color (OSC 11). The reply is
/// `ESC ] 11 ; rgb:RRRR/GGGG/BBBB` terminated by BEL or ST.
#[inline]
pub fn request_background_color(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b]11;?\x07")
}

// ─── Stripping and Width ─────────────────────────────────────────────────────

/// Remove every escape sequence from `input`.
///
/// CSI (`ESC [` … final byte 0x40–0x7E) and OSC (`ESC ]` … BEL or `ESC \`)
/// are removed whole; any other `ESC x` pair is removed as two bytes; an
/// unterminated sequence at the end is dropped. The result never contains
/// ESC, so stripping twice equals stripping once. Borrows when there is
/// nothing to strip.
#[must_use]
pub fn strip_ansi(input: &[u8]) -> Cow<'_, [u8]> {
    if !input.contains(&ESC) {
        return Cow::Borrowed(input);
    }
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i..].iter().position(|&b| b == ESC) {
            Some(off) => {
                out.extend_from_slice(&input[i..i + off]);
                i = skip_escape(input, i + off);
            }
            None => {
                out.extend_from_slice(&input[i..]);
                break;
            }
        }
    }
    Cow::Owned(out)
}

/// [`strip_ansi`] for text.
#[must_use]
pub fn strip_ansi_str(s: &str) -> Cow<'_, str> {
    match strip_ansi(s.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(s),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Index just past the escape sequence starting at `start` (which holds
/// ESC), or `s.len()` if it never terminates.
fn skip_escape(s: &[u8], start: usize) -> usize {
    let body = start + 2;
    match s.get(start + 1) {
        None => s.len(),
        Some(b'[') => s[body..]
            .iter()
            .position(|b| (0x40..=0x7e).contains(b))
            .map_or(s.len(), |off| body + off + 1),
        Some(b']') => {
            let mut j = body;
            while j < s.len() {
                if s[j] == BEL {
                    return j + 1;
                }
                if s[j] == ESC && s.get(j + 1) == Some(&b'\\') {
                    return j + 2;
                }
                j += 1;
            }
            s.len()
        }
        Some(_) => body,
    }
}

/// Display width of `s` in terminal cells, ignoring escape sequences.
///
/// Measured per grapheme cluster, so combining marks add nothing and wide
/// (CJK, emoji) clusters count as two.
#[must_use]
pub fn screen_width(s: &str) -> usize {
    strip_ansi_str(s)
        .graphemes(true)
        .map(UnicodeWidthStr::width)
        .sum()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn strip(s: &str) -> String {
        strip_ansi_str(s).into_owned()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
    }

    #[test]
    fn cursor_to_is_row_then_column() {
        assert_eq!(emit(|w| cursor_to(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_to_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_column_is_one_based() {
        assert_eq!(emit(|w| cursor_column(w, 4)), "\x1b[5G");
    }

    #[test]
    fn cursor_visibility() {
        assert_eq!(emit(|w| cursor_hide(w)), "\x1b[?25l");
        assert_eq!(emit(|w| cursor_show(w)), "\x1b[?25h");
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn screen_sequences() {
        assert_eq!(emit(|w| clear_screen(w)), "\x1b[2J");
        assert_eq!(emit(|w| clear_to_eol(w)), "\x1b[K");
        assert_eq!(emit(|w| reset(w)), "\x1b[0m");
    }

    // ── Colors ──────────────────────────────────────────────────────────

    #[test]
    fn fg_standard_and_bright() {
        assert_eq!(emit(|w| fg(w, Color::BLACK)), "\x1b[30m");
        assert_eq!(emit(|w| fg(w, Color::WHITE)), "\x1b[37m");
        assert_eq!(emit(|w| fg(w, Color::BLACK.bright())), "\x1b[90m");
        assert_eq!(emit(|w| fg(w, Color::Indexed(15))), "\x1b[97m");
    }

    #[test]
    fn bg_standard_and_bright() {
        assert_eq!(emit(|w| bg(w, Color::RED)), "\x1b[41m");
        assert_eq!(emit(|w| bg(w, Color::RED.bright())), "\x1b[101m");
        assert_eq!(emit(|w| bg(w, Color::Indexed(15))), "\x1b[107m");
    }

    #[test]
    fn palette_colors() {
        assert_eq!(emit(|w| fg(w, Color::Indexed(16))), "\x1b[38;5;16m");
        assert_eq!(emit(|w| bg(w, Color::Indexed(255))), "\x1b[48;5;255m");
    }

    #[test]
    fn truecolor() {
        assert_eq!(emit(|w| fg(w, Color::rgb(255, 128, 0))), "\x1b[38;2;255;128;0m");
        assert_eq!(emit(|w| bg(w, Color::rgb(0, 0, 0))), "\x1b[48;2;0;0;0m");
    }

    #[test]
    fn default_colors() {
        assert_eq!(emit(|w| fg(w, Color::Default)), "\x1b[39m");
        assert_eq!(emit(|w| bg(w, Color::Default)), "\x1b[49m");
    }

    #[test]
    fn bright_leaves_non_standard_colors_alone() {
        assert_eq!(Color::Indexed(200).bright(), Color::Indexed(200));
        assert_eq!(Color::Default.bright(), Color::Default);
    }

    #[test]
    fn rgb_display_and_darkness() {
        assert_eq!(Rgb::new(0x1e, 0x1e, 0x2e).to_string(), "#1e1e2e");
        assert!(Rgb::new(0x1e, 0x1e, 0x2e).is_dark());
        assert!(!Rgb::new(0xff, 0xff, 0xff).is_dark());
    }

    // ── Attributes ──────────────────────────────────────────────────────

    #[test]
    fn attrs_empty_emits_nothing() {
        assert_eq!(emit(|w| attrs(w, Attr::empty())), "");
    }

    #[test]
    fn attrs_single() {
        assert_eq!(emit(|w| attrs(w, Attr::UNDERLINE)), "\x1b[4m");
    }

    #[test]
    fn attrs_combined_in_code_order() {
        assert_eq!(emit(|w| attrs(w, Attr::INVERSE | Attr::BOLD)), "\x1b[1;7m");
        assert_eq!(emit(|w| attrs(w, Attr::all())), "\x1b[1;2;4;5;7m");
    }

    // ── Modes and queries ───────────────────────────────────────────────

    #[test]
    fn sync_sequences() {
        assert_eq!(emit(|w| begin_sync(w)), "\x1b[?2026h");
        assert_eq!(emit(|w| end_sync(w)), "\x1b[?2026l");
    }

    #[test]
    fn mouse_modes() {
        assert_eq!(emit(|w| enable_mouse(w, MouseMode::Click)), "\x1b[?1000h\x1b[?1006h");
        assert_eq!(emit(|w| enable_mouse(w, MouseMode::Track)), "\x1b[?1003h\x1b[?1006h");
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Pixels)),
            "\x1b[?1003h\x1b[?1016h\x1b[?1006h"
        );
    }

    #[test]
    fn mouse_off_disables_every_mode() {
        let s = emit(|w| disable_mouse(w));
        for mode in ["1000", "1003", "1006", "1016"] {
            assert!(s.contains(&format!("\x1b[?{mode}l")), "missing {mode}");
        }
    }

    #[test]
    fn shift_reporting_toggle() {
        assert_eq!(emit(|w| shift_reporting(w, true)), "\x1b[>1s");
        assert_eq!(emit(|w| shift_reporting(w, false)), "\x1b[>0s");
    }

    #[test]
    fn bracketed_paste_toggle() {
        assert_eq!(emit(|w| enable_bracketed_paste(w)), "\x1b[?2004h");
        assert_eq!(emit(|w| disable_bracketed_paste(w)), "\x1b[?2004l");
    }

    #[test]
    fn query_sequences() {
        assert_eq!(emit(|w| request_cursor_position(w)), "\x1b[6n");
        assert_eq!(emit(|w| request_background_color(w)), "\x1b]11;?\x07");
    }

    // ── Stripping ───────────────────────────────────────────────────────

    #[test]
    fn strip_plain_text_borrows() {
        assert!(matches!(strip_ansi(b"plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn strip_removes_csi() {
        assert_eq!(strip("\x1b[1;31mred\x1b[0m"), "red");
        assert_eq!(strip("a\x1b[2Jb\x1b[?25lc"), "abc");
    }

    #[test]
    fn strip_removes_osc_with_either_terminator() {
        assert_eq!(strip("x\x1b]0;title\x07y"), "xy");
        assert_eq!(strip("x\x1b]11;rgb:0/0/0\x1b\\y"), "xy");
    }

    #[test]
    fn strip_removes_two_byte_escapes() {
        assert_eq!(strip("a\x1b7b\x1b8c"), "abc");
    }

    #[test]
    fn strip_drops_unterminated_tail() {
        assert_eq!(strip("ok\x1b[12;"), "ok");
        assert_eq!(strip("ok\x1b]11;rgb"), "ok");
        assert_eq!(strip("ok\x1b"), "ok");
    }

    #[test]
    fn strip_is_idempotent() {
        let samples = [
            "plain",
            "\x1b[31mred\x1b[0m",
            "\x1b\x1b[m",
            "\x1b[\x1b[1mx",
            "\x1b]\x1b\x1b\\y",
            "tail\x1b",
            "\x1b]8;;http://x\x1b\\link\x1b]8;;\x1b\\",
        ];
        for s in samples {
            let once = strip(s);
            assert!(!once.contains('\x1b'), "{s:?} left ESC in {once:?}");
            assert_eq!(strip(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn strip_keeps_utf8_text() {
        assert_eq!(strip("\x1b[1m日本語\x1b[0m"), "日本語");
    }

    // ── Width ───────────────────────────────────────────────────────────

    #[test]
    fn width_ascii() {
        assert_eq!(screen_width("hello"), 5);
    }

    #[test]
    fn width_ignores_escapes() {
        assert_eq!(screen_width("\x1b[1;32mok\x1b[0m"), 2);
    }

    #[test]
    fn width_wide_characters() {
        assert_eq!(screen_width("日本"), 4);
    }

    #[test]
    fn width_combining_mark() {
        assert_eq!(screen_width("e\u{301}"), 1);
    }

    #[test]
    fn width_empty() {
        assert_eq!(screen_width(""), 0);
    }
}
