// SPDX-License-Identifier: MIT
//
// Inbound decoder — cursor reports, mouse events, and background color.
//
// The frame scheduler collects each tick's bytes into one buffer and runs
// the decoders over it in a fixed order:
//
//   1. cursor-position reports (`ESC [ row ; col R`), which are solicited
//      and must never be mistaken for typed keys;
//   2. mouse events, SGR (`ESC [ < b ; x ; y M|m`) then legacy X10
//      (`ESC [ M` + three bytes);
//   3. OSC 11 background-color replies.
//
// Every decoded sequence is spliced out of the buffer in place; whatever
// remains is keyboard input. When several sequences of one kind arrive in
// one tick, the last one wins.
//
// A sequence cut off at the end of the buffer is "partial": it is left in
// place, and `decode` reports how long the partial tail is so the scheduler
// can carry it into the next tick. A malformed OSC 11 reply is logged and
// discarded through the offending byte. Decoder errors never leave this
// module.
//
// Number parsing works directly on `&[u8]`, no intermediate strings.

use bitflags::bitflags;
use thiserror::Error;

use crate::ansi::Rgb;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

const CSI: &[u8] = b"\x1b[";
const SGR_MOUSE: &[u8] = b"\x1b[<";
const LEGACY_MOUSE: &[u8] = b"\x1b[M";
const OSC_BACKGROUND: &[u8] = b"\x1b]11;";

/// Length of a legacy mouse report: `ESC [ M` plus three payload bytes.
const LEGACY_LEN: usize = 6;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Why a sequence could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ends inside the sequence; more bytes may complete it.
    #[error("partial sequence")]
    Partial,
    /// The byte at this offset (from the sequence start) breaks the grammar.
    #[error("malformed sequence at offset {0}")]
    Malformed(usize),
}

// ─── Decoded Values ─────────────────────────────────────────────────────────

bitflags! {
    /// Modifier and kind bits of a mouse button code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct MouseFlags: u16 {
        const SHIFT  = 0b0000_0100;
        const ALT    = 0b0000_1000;
        const CTRL   = 0b0001_0000;
        const MOTION = 0b0010_0000;
        const WHEEL  = 0b0100_0000;
    }
}

/// Bits that carry modifiers, masked out before comparing button codes.
const MODIFIER_MASK: u16 = MouseFlags::SHIFT.bits() | MouseFlags::ALT.bits() | MouseFlags::CTRL.bits();

/// One mouse report.
///
/// Coordinates are as the terminal sends them: 1-based cells, or pixels in
/// pixel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mouse {
    /// Raw button code: bits 0–1 button, then [`MouseFlags`].
    pub buttons: u16,
    pub x: u16,
    pub y: u16,
    /// SGR release (`m` terminator).
    pub release: bool,
}

impl Mouse {
    /// The button code with modifier bits cleared.
    #[inline]
    #[must_use]
    pub const fn button(self) -> u16 {
        self.buttons & !MODIFIER_MASK
    }

    #[must_use]
    pub const fn flags(self) -> MouseFlags {
        MouseFlags::from_bits_truncate(self.buttons)
    }

    #[must_use]
    pub const fn left_click(self) -> bool {
        !self.release && self.button() == 0
    }

    #[must_use]
    pub const fn middle_click(self) -> bool {
        !self.release && self.button() == 1
    }

    #[must_use]
    pub const fn right_click(self) -> bool {
        !self.release && self.button() == 2
    }

    #[must_use]
    pub const fn left_drag(self) -> bool {
        self.button() == MouseFlags::MOTION.bits()
    }

    #[must_use]
    pub const fn middle_drag(self) -> bool {
        self.button() == MouseFlags::MOTION.bits() | 1
    }

    #[must_use]
    pub const fn right_drag(self) -> bool {
        self.button() == MouseFlags::MOTION.bits() | 2
    }

    /// Motion with no button held.
    #[must_use]
    pub const fn moved(self) -> bool {
        self.button() == MouseFlags::MOTION.bits() | 3
    }

    /// A button release: the SGR `m` terminator or the legacy sentinel 3.
    #[must_use]
    pub const fn released(self) -> bool {
        self.release || self.button() == 3
    }

    /// Wheel up. Shifted wheel may arrive with the right-button bit set,
    /// so that bit is ignored too.
    #[must_use]
    pub const fn wheel_up(self) -> bool {
        self.buttons & !(MODIFIER_MASK | 2) == MouseFlags::WHEEL.bits()
    }

    #[must_use]
    pub const fn wheel_down(self) -> bool {
        self.buttons & !(MODIFIER_MASK | 2) == MouseFlags::WHEEL.bits() | 1
    }

    #[must_use]
    pub const fn shift(self) -> bool {
        self.buttons & MouseFlags::SHIFT.bits() != 0
    }

    #[must_use]
    pub const fn alt(self) -> bool {
        self.buttons & MouseFlags::ALT.bits() != 0
    }

    #[must_use]
    pub const fn ctrl(self) -> bool {
        self.buttons & MouseFlags::CTRL.bits() != 0
    }
}

/// A cursor-position report, 1-based as sent by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub x: u16,
    pub y: u16,
}

/// What the decoders found in the latest tick. Valid only until the next
/// tick clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub mouse: Option<Mouse>,
    pub cursor: Option<CursorPos>,
    pub background: Option<Rgb>,
}

impl InputState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mouse.is_none() && self.cursor.is_none() && self.background.is_none()
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Run every decoder over `buf` in the fixed order and return the length of
/// the partial escape sequence at the end of `buf` (zero if none).
///
/// `more` performs one bounded read into the given slice and returns the
/// count; it is used at most once, to complete a legacy mouse report.
pub fn decode<F>(buf: &mut Vec<u8>, state: &mut InputState, more: F) -> usize
where
    F: FnMut(&mut [u8]) -> usize,
{
    // Partial results are picked up by the tail scan below.
    let _ = decode_cursor_reports(buf, state);
    let _ = decode_mouse(buf, state, more);
    let _ = decode_background(buf, state);
    partial_tail(buf)
}

/// Splice out every cursor-position report.
///
/// # Errors
///
/// [`DecodeError::Partial`] if a report is cut off at the end of `buf`.
pub fn decode_cursor_reports(buf: &mut Vec<u8>, state: &mut InputState) -> Result<(), DecodeError> {
    let mut from = 0;
    while let Some(p) = find(buf, from, CSI) {
        match parse_cursor_report(&buf[p..]) {
            Ok((pos, len)) => {
                buf.drain(p..p + len);
                state.cursor = Some(pos);
                from = p;
            }
            Err(DecodeError::Partial) => return Err(DecodeError::Partial),
            // Some other CSI sequence; it stays as keyboard input.
            Err(DecodeError::Malformed(_)) => from = p + 1,
        }
    }
    Ok(())
}

/// Splice out every SGR and legacy mouse report.
///
/// # Errors
///
/// [`DecodeError::Partial`] if a report is cut off at the end of `buf`
/// (after the one extra read through `more` for legacy reports).
pub fn decode_mouse<F>(buf: &mut Vec<u8>, state: &mut InputState, mut more: F) -> Result<(), DecodeError>
where
    F: FnMut(&mut [u8]) -> usize,
{
    // An SGR report cut off at the tail must not hide legacy reports
    // earlier in the buffer, so the legacy pass runs regardless.
    let mut partial = false;
    let mut from = 0;
    while let Some(p) = find(buf, from, SGR_MOUSE) {
        match parse_sgr_mouse(&buf[p..]) {
            Ok((mouse, len)) => {
                buf.drain(p..p + len);
                state.mouse = Some(mouse);
                from = p;
            }
            Err(DecodeError::Partial) => {
                partial = true;
                break;
            }
            Err(DecodeError::Malformed(_)) => from = p + 1,
        }
    }

    let mut asked = false;
    from = 0;
    while let Some(p) = find(buf, from, LEGACY_MOUSE) {
        let have = buf.len() - p;
        if have < LEGACY_LEN && !asked {
            asked = true;
            let mut extra = [0u8; LEGACY_LEN];
            let want = LEGACY_LEN - have;
            let n = more(&mut extra[..want]).min(want);
            buf.extend_from_slice(&extra[..n]);
        }
        match parse_legacy_mouse(&buf[p..]) {
            Ok(mouse) => {
                buf.drain(p..p + LEGACY_LEN);
                state.mouse = Some(mouse);
                from = p;
            }
            Err(DecodeError::Partial) => {
                partial = true;
                break;
            }
            Err(DecodeError::Malformed(_)) => from = p + 1,
        }
    }
    if partial { Err(DecodeError::Partial) } else { Ok(()) }
}

/// Splice out every OSC 11 background-color reply.
///
/// Malformed replies are logged and discarded through the offending byte;
/// an offending ESC is kept because it may start the next sequence.
///
/// # Errors
///
/// [`DecodeError::Partial`] if a reply is cut off at the end of `buf`.
pub fn decode_background(buf: &mut Vec<u8>, state: &mut InputState) -> Result<(), DecodeError> {
    let mut from = 0;
    while let Some(p) = find(buf, from, OSC_BACKGROUND) {
        match parse_background(&buf[p..]) {
            Ok((rgb, len)) => {
                buf.drain(p..p + len);
                state.background = Some(rgb);
            }
            Err(DecodeError::Partial) => return Err(DecodeError::Partial),
            Err(DecodeError::Malformed(at)) => {
                tracing::warn!(
                    message = "malformed background color reply",
                    bytes = ?String::from_utf8_lossy(&buf[p..=p + at]),
                );
                let end = if buf[p + at] == ESC { p + at } else { p + at + 1 };
                buf.drain(p..end);
            }
        }
        from = p;
    }
    Ok(())
}

/// Length of the unfinished escape sequence at the end of `buf`.
#[must_use]
pub fn partial_tail(buf: &[u8]) -> usize {
    let mut i = 0;
    while let Some(off) = buf[i..].iter().position(|&b| b == ESC) {
        let p = i + off;
        match sequence_end(buf, p) {
            Some(end) => i = end,
            None => return buf.len() - p,
        }
    }
    0
}

/// Index just past the escape sequence starting at `p`, or `None` if the
/// buffer ends first.
fn sequence_end(buf: &[u8], p: usize) -> Option<usize> {
    let body = p + 2;
    match buf.get(p + 1)? {
        b'[' => {
            if buf.get(body) == Some(&b'M') {
                return (buf.len() >= p + LEGACY_LEN).then_some(p + LEGACY_LEN);
            }
            buf.get(body..)?
                .iter()
                .position(|b| (0x40..=0x7e).contains(b))
                .map(|off| body + off + 1)
        }
        b']' => {
            let mut j = body;
            while j < buf.len() {
                match buf[j] {
                    BEL => return Some(j + 1),
                    ESC => {
                        return match buf.get(j + 1) {
                            None => None,
                            Some(b'\\') => Some(j + 2),
                            // An unterminated OSC; the ESC starts something new.
                            Some(_) => Some(j),
                        };
                    }
                    _ => j += 1,
                }
            }
            None
        }
        // SS3: ESC O + one byte.
        b'O' => (buf.len() > body).then_some(body + 1),
        _ => Some(body),
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────
//
// Each parser sees a slice starting at the sequence's ESC and returns the
// decoded value plus the number of bytes it spans.

fn parse_cursor_report(buf: &[u8]) -> Result<(CursorPos, usize), DecodeError> {
    debug_assert!(buf.starts_with(CSI));
    let (row, i) = parse_number(buf, CSI.len())?;
    let i = expect(buf, i, b';')?;
    let (col, i) = parse_number(buf, i)?;
    let i = expect(buf, i, b'R')?;
    Ok((CursorPos { x: col, y: row }, i))
}

fn parse_sgr_mouse(buf: &[u8]) -> Result<(Mouse, usize), DecodeError> {
    debug_assert!(buf.starts_with(SGR_MOUSE));
    let (buttons, i) = parse_number(buf, SGR_MOUSE.len())?;
    let i = expect(buf, i, b';')?;
    let (x, i) = parse_number(buf, i)?;
    let i = expect(buf, i, b';')?;
    let (y, i) = parse_number(buf, i)?;
    let release = match buf.get(i) {
        None => return Err(DecodeError::Partial),
        Some(b'M') => false,
        Some(b'm') => true,
        Some(_) => return Err(DecodeError::Malformed(i)),
    };
    Ok((Mouse { buttons, x, y, release }, i + 1))
}

fn parse_legacy_mouse(buf: &[u8]) -> Result<Mouse, DecodeError> {
    debug_assert!(buf.starts_with(LEGACY_MOUSE));
    let payload = buf.get(LEGACY_MOUSE.len()..LEGACY_LEN).ok_or(DecodeError::Partial)?;
    if let Some(k) = payload.iter().position(|&b| b < 32) {
        return Err(DecodeError::Malformed(LEGACY_MOUSE.len() + k));
    }
    Ok(Mouse {
        buttons: u16::from(payload[0] - 32),
        x: u16::from(payload[1] - 32),
        y: u16::from(payload[2] - 32),
        release: false,
    })
}

fn parse_background(buf: &[u8]) -> Result<(Rgb, usize), DecodeError> {
    debug_assert!(buf.starts_with(OSC_BACKGROUND));
    let mut i = OSC_BACKGROUND.len();
    for &want in b"rgb:" {
        i = expect(buf, i, want)?;
    }
    let (r, next) = parse_channel(buf, i)?;
    i = expect(buf, next, b'/')?;
    let (g, next) = parse_channel(buf, i)?;
    i = expect(buf, next, b'/')?;
    let (b, next) = parse_channel(buf, i)?;
    i = next;

    match buf.get(i) {
        None => Err(DecodeError::Partial),
        Some(&BEL) => Ok((Rgb { r, g, b }, i + 1)),
        Some(&ESC) => match buf.get(i + 1) {
            None => Err(DecodeError::Partial),
            Some(b'\\') => Ok((Rgb { r, g, b }, i + 2)),
            Some(_) => Err(DecodeError::Malformed(i)),
        },
        Some(_) => Err(DecodeError::Malformed(i)),
    }
}

/// One hex color channel of 1–4 digits, scaled to 8 bits (4 digits keep
/// the high byte, 2 digits are taken as is).
fn parse_channel(buf: &[u8], start: usize) -> Result<(u8, usize), DecodeError> {
    let mut value: u16 = 0;
    let mut i = start;
    while i - start < 4 {
        let Some(&byte) = buf.get(i) else {
            return Err(DecodeError::Partial);
        };
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => break,
        };
        value = value << 4 | u16::from(digit);
        i += 1;
    }
    #[allow(clippy::cast_possible_truncation)] // Every arm yields 0..=255.
    let channel = match i - start {
        0 => return Err(DecodeError::Malformed(i)),
        1 => (value * 17) as u8,
        2 => value as u8,
        3 => (value >> 4) as u8,
        _ => (value >> 8) as u8,
    };
    Ok((channel, i))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// First occurrence of `needle` in `haystack[from..]`, as an absolute index.
fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|off| from + off)
}

/// Parse at least one decimal digit starting at `start`.
fn parse_number(buf: &[u8], start: usize) -> Result<(u16, usize), DecodeError> {
    let mut val: u16 = 0;
    let mut pos = start;
    while pos < buf.len() && buf[pos].is_ascii_digit() {
        val = val
            .saturating_mul(10)
            .saturating_add(u16::from(buf[pos] - b'0'));
        pos += 1;
    }
    if pos == buf.len() {
        return Err(DecodeError::Partial);
    }
    if pos == start {
        return Err(DecodeError::Malformed(pos));
    }
    Ok((val, pos))
}

/// Require `want` at `pos`.
fn expect(buf: &[u8], pos: usize, want: u8) -> Result<usize, DecodeError> {
    match buf.get(pos) {
        None => Err(DecodeError::Partial),
        Some(&b) if b == want => Ok(pos + 1),
        Some(_) => Err(DecodeError::Malformed(pos)),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
