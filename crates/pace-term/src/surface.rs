// SPDX-License-Identifier: MIT
//
// Drawing surface — the application-facing handle over input and output.
//
// A `Surface` owns one side of everything the application touches: a
// buffered, CRLF-translating writer for outbound escape sequences, and a
// shared `InterruptReader` for inbound bytes. The frame scheduler
// (`event_loop`) is implemented on the same type, so drawing and reading
// happen through one `&mut Surface`.
//
// Output is buffered. It reaches the terminal at the flush points only:
// end-of-sync (emitted before every wait), cursor and background
// requests, explicit `flush`, and `restore`.
//
// All coordinates in this API are 0-based. The ANSI layer converts to the
// terminal's 1-based addressing.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ansi::{self, Attr, Color, MouseMode, Rgb};
use crate::cancel::CancelToken;
use crate::config::SurfaceConfig;
use crate::crlf::CrlfWriter;
use crate::error::{Error, Result};
use crate::input::{InputState, Mouse};
use crate::interrupt::InterruptReader;
use crate::signals::Signals;
use crate::terminal::Size;

/// How long the query round trips wait for the terminal to answer.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Bytes requested from the interrupt reader per tick.
pub(crate) const TICK_READ: usize = 4096;

/// Called after the size changes, before the tick returns.
pub type ResizeCallback = Box<dyn FnMut(&mut Surface) -> Result<()> + Send>;

type Output = BufWriter<CrlfWriter<Box<dyn Write + Send>>>;

// ─── Surface ─────────────────────────────────────────────────────────────────

/// A terminal drawing surface with a frame-paced input scheduler.
///
/// Create one with [`open`](Self::open) for the real terminal or
/// [`with_reader`](Self::with_reader) for any reader and writer. Dropping
/// the surface calls [`restore`](Self::restore).
pub struct Surface {
    pub(crate) reader: Arc<InterruptReader>,
    pub(crate) out: Output,
    pub(crate) config: SurfaceConfig,
    pub(crate) signals: Option<Arc<Signals>>,
    pub(crate) token: CancelToken,
    pub(crate) size: Size,

    /// Keyboard bytes of the latest tick, with decoded sequences removed.
    pub(crate) data: Vec<u8>,
    /// A partial escape sequence held over from the previous tick.
    pub(crate) carry: Vec<u8>,
    pub(crate) scratch: Vec<u8>,
    pub(crate) input: InputState,

    pub(crate) on_resize: Option<ResizeCallback>,
    pub(crate) resized: bool,
    pub(crate) in_sync: bool,
    pub(crate) last_tick: Option<Instant>,

    /// Raw mode was entered by this surface and is undone by `restore`.
    owns_terminal: bool,
    restored: bool,
}

impl Surface {
    /// Take over the controlling terminal.
    ///
    /// Uses the process-wide stdin reader, installs the signal watcher when
    /// `config.watch_signals` is set, enters raw mode, starts the producer,
    /// and queries the size.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed or the
    /// terminal cannot enter raw mode.
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot spawn the producer thread.
    pub fn open(config: SurfaceConfig) -> Result<Self> {
        let reader = InterruptReader::global_with(config.reader, config.timeout);

        if config.watch_signals {
            reader.watch_signals(Arc::new(Signals::watch()?));
        }
        reader.set_bracketed_paste(config.bracketed_paste);
        reader.raw_mode()?;

        let mut surface = Self::with_reader(reader, io::stdout(), config);
        surface.owns_terminal = true;
        tracing::debug!(
            message = "surface opened",
            fps = config.fps,
            paced = config.paced,
            cols = surface.size.cols,
            rows = surface.size.rows,
        );
        Ok(surface)
    }

    /// A surface over an existing reader and any writer.
    ///
    /// The terminal mode is left alone. Newline translation is on only if
    /// the reader's terminal is already raw. Signals come from the reader's
    /// watcher, if any. The producer's quantum is set to
    /// [`SurfaceConfig::producer_timeout`] and the producer is (re)started
    /// with a fresh token.
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot spawn the producer thread.
    pub fn with_reader<W>(reader: Arc<InterruptReader>, out: W, config: SurfaceConfig) -> Self
    where
        W: Write + Send + 'static,
    {
        let mut crlf = CrlfWriter::new(Box::new(out) as Box<dyn Write + Send>);
        crlf.set_enabled(reader.is_raw());

        reader.change_timeout(config.producer_timeout());
        let token = CancelToken::new();
        reader.start(&token);

        Self {
            signals: reader.signals(),
            size: reader.size(),
            reader,
            out: BufWriter::new(crlf),
            config,
            token,
            data: Vec::new(),
            carry: Vec::new(),
            scratch: vec![0; TICK_READ],
            input: InputState::default(),
            on_resize: None,
            resized: false,
            in_sync: false,
            last_tick: None,
            owns_terminal: false,
            restored: false,
        }
    }

    /// Put the terminal back: end sync, mouse off, reset style, show the
    /// cursor, flush, stop the producer (its quantum goes back to
    /// `config.timeout`), and leave raw mode if this surface entered it.
    /// Later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the first output or terminal error. Every step runs anyway.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        let written = self.write_restore();
        self.token.cancel();
        self.reader.stop();
        self.reader.change_timeout(self.config.timeout);
        let mode = if self.owns_terminal {
            self.reader.normal_mode()
        } else {
            Ok(())
        };
        tracing::debug!(message = "surface restored", owns_terminal = self.owns_terminal);
        written.map_err(Error::from).and(mode)
    }

    fn write_restore(&mut self) -> io::Result<()> {
        if self.in_sync {
            ansi::end_sync(&mut self.out)?;
            self.in_sync = false;
        }
        ansi::disable_mouse(&mut self.out)?;
        ansi::reset(&mut self.out)?;
        ansi::cursor_show(&mut self.out)?;
        self.out.flush()
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Terminal size as of the latest tick (or resize).
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Keyboard bytes received in the latest tick.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The last mouse event decoded in the latest tick.
    #[inline]
    #[must_use]
    pub const fn mouse(&self) -> Option<Mouse> {
        self.input.mouse
    }

    /// Everything the decoders found in the latest tick.
    #[inline]
    #[must_use]
    pub const fn input(&self) -> &InputState {
        &self.input
    }

    /// Whether the latest tick handled a resize.
    #[inline]
    #[must_use]
    pub const fn resized(&self) -> bool {
        self.resized
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Change the frame rate for subsequent ticks, retuning the
    /// producer's quantum to match.
    pub fn set_fps(&mut self, fps: u32) {
        self.config.fps = fps;
        self.reader.change_timeout(self.config.producer_timeout());
    }

    /// The shared reader, e.g. to read a line at a prompt.
    #[inline]
    #[must_use]
    pub const fn reader(&self) -> &Arc<InterruptReader> {
        &self.reader
    }

    /// Run `callback` whenever the terminal size changes.
    pub fn set_on_resize<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Self) -> Result<()> + Send + 'static,
    {
        self.on_resize = Some(Box::new(callback));
    }

    /// Turn `\n` → `\r\n` translation on or off. Buffered output is
    /// flushed first, under the old setting.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn set_crlf(&mut self, enabled: bool) -> Result<()> {
        self.out.flush()?;
        self.out.get_mut().set_enabled(enabled);
        Ok(())
    }

    // ── Cursor and screen ───────────────────────────────────────────

    /// Move the cursor to column `x`, row `y`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn move_cursor(&mut self, x: u16, y: u16) -> Result<()> {
        Ok(ansi::cursor_to(&mut self.out, x, y)?)
    }

    /// Move the cursor to column `x` on the current row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn move_horizontally(&mut self, x: u16) -> Result<()> {
        Ok(ansi::cursor_column(&mut self.out, x)?)
    }

    /// Clear the screen and home the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn clear_screen(&mut self) -> Result<()> {
        ansi::clear_screen(&mut self.out)?;
        Ok(ansi::cursor_to(&mut self.out, 0, 0)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn clear_end_of_line(&mut self) -> Result<()> {
        Ok(ansi::clear_to_eol(&mut self.out)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn hide_cursor(&mut self) -> Result<()> {
        Ok(ansi::cursor_hide(&mut self.out)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn show_cursor(&mut self) -> Result<()> {
        Ok(ansi::cursor_show(&mut self.out)?)
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Write text at the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        Ok(self.out.write_all(text.as_bytes())?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_char(&mut self, ch: char) -> Result<()> {
        let mut utf8 = [0; 4];
        self.write_str(ch.encode_utf8(&mut utf8))
    }

    /// Write text starting at column `x`, row `y`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_at(&mut self, x: u16, y: u16, text: &str) -> Result<()> {
        self.move_cursor(x, y)?;
        self.write_str(text)
    }

    /// Write one line of text centered horizontally on row `y`.
    ///
    /// Width is measured in screen columns, ignoring escape sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_centered(&mut self, y: u16, text: &str) -> Result<()> {
        let width = to_u16(ansi::screen_width(text));
        self.write_at(self.size.cols.saturating_sub(width) / 2, y, text)
    }

    /// Draw `text` inside a box-drawing frame, centered on the screen.
    ///
    /// Each line of `text` gets one column of padding on either side:
    ///
    /// ```text
    /// ┌───────┐
    /// │ hello │
    /// │ you   │
    /// └───────┘
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_boxed(&mut self, text: &str) -> Result<()> {
        let lines: Vec<&str> = text.lines().collect();
        let inner = lines.iter().map(|line| ansi::screen_width(line)).max().unwrap_or(0);
        let width = to_u16(inner + 4);
        let height = to_u16(lines.len() + 2);
        let x = self.size.cols.saturating_sub(width) / 2;
        let y = self.size.rows.saturating_sub(height) / 2;

        let rule = "─".repeat(inner + 2);
        self.write_at(x, y, &format!("┌{rule}┐"))?;
        for (row, line) in (y.saturating_add(1)..).zip(&lines) {
            let pad = inner - ansi::screen_width(line);
            self.write_at(x, row, &format!("│ {line}{:pad$} │", ""))?;
        }
        self.write_at(x, y.saturating_add(height - 1), &format!("└{rule}┘"))
    }

    // ── Style ───────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn set_attrs(&mut self, attr: Attr) -> Result<()> {
        Ok(ansi::attrs(&mut self.out, attr)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn set_fg(&mut self, color: Color) -> Result<()> {
        Ok(ansi::fg(&mut self.out, color)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn set_bg(&mut self, color: Color) -> Result<()> {
        Ok(ansi::bg(&mut self.out, color)?)
    }

    /// Reset colors and attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn reset_style(&mut self) -> Result<()> {
        Ok(ansi::reset(&mut self.out)?)
    }

    // ── Synchronized output ─────────────────────────────────────────

    /// Hold rendering until [`end_sync_mode`](Self::end_sync_mode) or the
    /// next wait, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn start_sync_mode(&mut self) -> Result<()> {
        ansi::begin_sync(&mut self.out)?;
        self.in_sync = true;
        Ok(())
    }

    /// End synchronized output (if started) and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn end_sync_mode(&mut self) -> Result<()> {
        if self.in_sync {
            ansi::end_sync(&mut self.out)?;
            self.in_sync = false;
        }
        self.flush()
    }

    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }

    // ── Mouse ───────────────────────────────────────────────────────

    /// Report button presses and releases.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn mouse_click_on(&mut self) -> Result<()> {
        Ok(ansi::enable_mouse(&mut self.out, MouseMode::Click)?)
    }

    /// Report all motion, with or without a button held.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn mouse_track_on(&mut self) -> Result<()> {
        Ok(ansi::enable_mouse(&mut self.out, MouseMode::Track)?)
    }

    /// Report all motion in pixel coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn mouse_pixels_on(&mut self) -> Result<()> {
        Ok(ansi::enable_mouse(&mut self.out, MouseMode::Pixels)?)
    }

    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn mouse_off(&mut self) -> Result<()> {
        Ok(ansi::disable_mouse(&mut self.out)?)
    }

    /// Ask the terminal to report Shift+mouse instead of selecting text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn shift_reporting(&mut self, on: bool) -> Result<()> {
        Ok(ansi::shift_reporting(&mut self.out, on)?)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Send a cursor-position request and flush. The reply shows up in
    /// [`input`](Self::input) on a later tick.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn request_cursor_pos(&mut self) -> Result<()> {
        ansi::request_cursor_position(&mut self.out)?;
        self.flush()
    }

    /// Ask for the cursor position and tick until the reply arrives.
    ///
    /// Returns the 0-based `(x, y)`, or `None` if the terminal did not
    /// answer within [`REPLY_TIMEOUT`]. Keys typed meanwhile are kept for
    /// the next tick; mouse events are dropped.
    ///
    /// # Errors
    ///
    /// Returns read errors and interrupts from the ticks.
    pub fn read_cursor_pos(&mut self) -> Result<Option<(u16, u16)>> {
        self.request_cursor_pos()?;
        let pos = self.await_reply(|input| input.cursor.is_some())?;
        Ok(pos
            .and_then(|input| input.cursor)
            .map(|pos| (pos.x.saturating_sub(1), pos.y.saturating_sub(1))))
    }

    /// Send an OSC 11 background-color query and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn request_background_color(&mut self) -> Result<()> {
        ansi::request_background_color(&mut self.out)?;
        self.flush()
    }

    /// Ask for the background color and tick until the reply arrives.
    ///
    /// `None` if the terminal did not answer within [`REPLY_TIMEOUT`]; many
    /// terminals never do.
    ///
    /// # Errors
    ///
    /// Returns read errors and interrupts from the ticks.
    pub fn read_background_color(&mut self) -> Result<Option<Rgb>> {
        self.request_background_color()?;
        let reply = self.await_reply(|input| input.background.is_some())?;
        Ok(reply.and_then(|input| input.background))
    }

    /// Tick until `answered` holds, holding keyboard bytes back for the
    /// next tick.
    fn await_reply<F>(&mut self, answered: F) -> Result<Option<InputState>>
    where
        F: Fn(&InputState) -> bool,
    {
        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut held = Vec::new();
        let result = loop {
            let now = Instant::now();
            if now >= deadline {
                break Ok(None);
            }
            let wait = self.config.frame_duration().min(deadline - now);
            if let Err(err) = self.tick(wait) {
                break Err(err);
            }
            held.extend_from_slice(&self.data);
            if answered(&self.input) {
                break Ok(Some(self.input));
            }
        };

        self.data.clear();
        held.append(&mut self.carry);
        self.carry = held;
        result
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("config", &self.config)
            .field("size", &self.size)
            .field("in_sync", &self.in_sync)
            .field("carry", &self.carry.len())
            .field("owns_terminal", &self.owns_terminal)
            .finish_non_exhaustive()
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(message = "failed to restore terminal", %err);
        }
    }
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scripted_surface;
    use pretty_assertions::assert_eq;

    fn fixed_size(surface: &mut Surface, cols: u16, rows: u16) {
        surface.size = Size { cols, rows };
    }

    // ── Buffering ───────────────────────────────────────────────

    #[test]
    fn output_is_buffered_until_flush() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.write_str("hello").unwrap();
        assert!(sink.contents().is_empty());
        surface.flush().unwrap();
        assert_eq!(sink.text(), "hello");
    }

    #[test]
    fn newline_translation_follows_reader_mode() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.write_str("a\nb").unwrap();
        surface.set_crlf(true).unwrap();
        surface.write_str("\nc").unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "a\nb\r\nc");
    }

    // ── Cursor and text ─────────────────────────────────────────

    #[test]
    fn cursor_movement_is_zero_based() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.move_cursor(0, 0).unwrap();
        surface.move_cursor(9, 4).unwrap();
        surface.move_horizontally(2).unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "\x1b[1;1H\x1b[5;10H\x1b[3G");
    }

    #[test]
    fn clear_screen_homes_the_cursor() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.clear_screen().unwrap();
        surface.clear_end_of_line().unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "\x1b[2J\x1b[1;1H\x1b[K");
    }

    #[test]
    fn write_at_and_char() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.write_at(3, 1, "ab").unwrap();
        surface.write_char('é').unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "\x1b[2;4Hab\u{e9}");
    }

    #[test]
    fn write_centered_uses_screen_width() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        fixed_size(&mut surface, 20, 10);
        surface.write_centered(2, "\x1b[1mhi\x1b[0m there").unwrap();
        surface.flush().unwrap();
        // "hi there" is 8 columns wide: (20 - 8) / 2 = 6.
        assert!(sink.text().starts_with("\x1b[3;7H"));
    }

    #[test]
    fn write_centered_wider_than_screen_starts_at_zero() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        fixed_size(&mut surface, 4, 2);
        surface.write_centered(0, "too wide").unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "\x1b[1;1Htoo wide");
    }

    #[test]
    fn write_boxed_frames_and_pads() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        fixed_size(&mut surface, 20, 10);
        surface.write_boxed("hello\nyou").unwrap();
        surface.flush().unwrap();
        // Box is 9 x 4: x = (20 - 9) / 2 = 5, y = (10 - 4) / 2 = 3.
        let expected = concat!(
            "\x1b[4;6H┌───────┐",
            "\x1b[5;6H│ hello │",
            "\x1b[6;6H│ you   │",
            "\x1b[7;6H└───────┘",
        );
        assert_eq!(sink.text(), expected);
    }

    #[test]
    fn write_boxed_empty_text() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        fixed_size(&mut surface, 10, 10);
        surface.write_boxed("").unwrap();
        surface.flush().unwrap();
        assert_eq!(sink.text(), "\x1b[5;4H┌──┐\x1b[6;4H└──┘");
    }

    // ── Style ───────────────────────────────────────────────────

    #[test]
    fn style_sequences() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.set_fg(Color::RED).unwrap();
        surface.set_bg(Color::Indexed(200)).unwrap();
        surface.set_fg(Color::rgb(1, 2, 3)).unwrap();
        surface.set_attrs(Attr::BOLD | Attr::UNDERLINE).unwrap();
        surface.reset_style().unwrap();
        surface.flush().unwrap();
        assert_eq!(
            sink.text(),
            "\x1b[31m\x1b[48;5;200m\x1b[38;2;1;2;3m\x1b[1;4m\x1b[0m"
        );
    }

    // ── Sync and mouse ──────────────────────────────────────────

    #[test]
    fn end_sync_flushes() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.start_sync_mode().unwrap();
        surface.write_str("frame").unwrap();
        surface.end_sync_mode().unwrap();
        assert_eq!(sink.text(), "\x1b[?2026hframe\x1b[?2026l");

        sink.clear();
        surface.end_sync_mode().unwrap();
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn mouse_modes() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.mouse_click_on().unwrap();
        surface.mouse_track_on().unwrap();
        surface.mouse_pixels_on().unwrap();
        surface.shift_reporting(true).unwrap();
        surface.mouse_off().unwrap();
        surface.flush().unwrap();
        assert_eq!(
            sink.text(),
            concat!(
                "\x1b[?1000h\x1b[?1006h",
                "\x1b[?1003h\x1b[?1006h",
                "\x1b[?1003h\x1b[?1016h\x1b[?1006h",
                "\x1b[>1s",
                "\x1b[?1016l\x1b[?1006l\x1b[?1003l\x1b[?1000l",
            )
        );
    }

    // ── Queries ─────────────────────────────────────────────────

    #[test]
    fn read_cursor_pos_round_trip() {
        let (mut surface, feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        let reply = feeder.send_after(Duration::from_millis(30), b"\x1b[5;7R");
        let pos = surface.read_cursor_pos().unwrap();
        reply.join().unwrap();
        assert_eq!(pos, Some((6, 4)));
        assert!(sink.text().contains("\x1b[6n"));
    }

    #[test]
    fn read_cursor_pos_keeps_keys_for_next_tick() {
        let (mut surface, feeder, _sink, _signals) = scripted_surface(SurfaceConfig::default());
        feeder.send(b"k\x1b[2;3Rj");
        let pos = surface.read_cursor_pos().unwrap();
        assert_eq!(pos, Some((2, 1)));
        assert!(surface.data().is_empty());

        surface.read_or_resize_or_signal().unwrap();
        assert_eq!(surface.data(), b"kj");
    }

    #[test]
    fn read_background_color_round_trip() {
        let (mut surface, feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        feeder.send(b"\x1b]11;rgb:ffff/8080/0000\x07");
        let color = surface.read_background_color().unwrap();
        assert_eq!(color, Some(Rgb::new(255, 128, 0)));
        assert!(sink.text().contains("\x1b]11;?\x07"));
    }

    // ── Producer quantum ────────────────────────────────────────

    #[test]
    fn producer_quantum_follows_the_frame_rate() {
        let config = SurfaceConfig::default().with_fps(50);
        let (mut surface, _feeder, _sink, _signals) = scripted_surface(config);
        assert_eq!(surface.reader().timeout(), Duration::from_millis(20));

        surface.set_fps(100);
        assert_eq!(surface.config().fps, 100);
        assert_eq!(surface.config().frame_duration(), Duration::from_millis(10));
        assert_eq!(surface.reader().timeout(), Duration::from_millis(10));

        surface.restore().unwrap();
        assert_eq!(surface.reader().timeout(), config.timeout);
    }

    // ── Restore ─────────────────────────────────────────────────

    #[test]
    fn restore_resets_terminal_state_once() {
        let (mut surface, _feeder, sink, _signals) = scripted_surface(SurfaceConfig::default());
        surface.start_sync_mode().unwrap();
        surface.restore().unwrap();
        assert_eq!(
            sink.text(),
            concat!(
                "\x1b[?2026h\x1b[?2026l",
                "\x1b[?1016l\x1b[?1006l\x1b[?1003l\x1b[?1000l",
                "\x1b[0m\x1b[?25h",
            )
        );
        assert!(!surface.reader().is_running());

        sink.clear();
        surface.restore().unwrap();
        drop(surface);
        assert!(sink.contents().is_empty());
    }
}
