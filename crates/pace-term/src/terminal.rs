// SPDX-License-Identifier: MIT
//
// Raw-mode terminal handle — termios save/restore, size query, TTY check.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, and raw fd writes. These are
// the standard POSIX interfaces for terminal control and have no safe
// equivalent in std. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// The handle owns exactly one saved copy of the original terminal
// attributes while raw mode is on. `normal_mode()` (or drop) puts them back.
// Unlike a full-screen editor this handle does not switch to the alternate
// screen: line consumers and frame loops share the normal screen, and raw
// mode is toggled around prompts.
//
// The panic hook writes a pre-built restore sequence directly to fd 1,
// bypassing Rust's stdout lock (a panic mid-flush would otherwise deadlock),
// then restores termios from a process-wide backup and hands over to the
// original hook so the message prints on a sane terminal.

use std::io::{self, Write};
use std::sync::Once;

#[cfg(unix)]
use std::os::fd::RawFd;
#[cfg(unix)]
use std::sync::Mutex;

use crate::ansi;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Size {
    /// Size assumed until the first successful query.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };
}

impl Default for Size {
    fn default() -> Self {
        Self::FALLBACK
    }
}

// ─── Terminal Queries ───────────────────────────────────────────────────────

#[cfg(unix)]
fn query_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

/// Query the size of the terminal on stdout via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    query_size(libc::STDOUT_FILENO)
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Check whether stdin is connected to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Panic-Safe Terminal Restore ────────────────────────────────────────────

/// Global backup of the original termios for panic recovery.
///
/// The [`Terminal`] owns its own copy, but the panic hook cannot reach it
/// (it usually sits behind the interrupt reader's mutex).
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

/// Restore sequence for emergencies.
///
/// End synchronized output, disable every mouse mode and the shift
/// override, disable bracketed paste, reset attributes, show the cursor.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b[?1016l\x1b[?1006l\x1b[?1003l\x1b[?1000l\
    \x1b[>0s\
    \x1b[?2004l\
    \x1b[0m\
    \x1b[?25h";

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();

            #[cfg(unix)]
            restore_termios_from_backup();

            original(info);
        }));
    });
}

fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Raw-mode handle for the process's controlling terminal.
///
/// Raw mode is toggled with [`raw_mode`](Self::raw_mode) and
/// [`normal_mode`](Self::normal_mode); the original attributes are restored
/// on drop, and by the panic hook if the process panics in raw mode.
///
/// When stdin is not a TTY (pipes, files, CI), raw mode is a no-op and
/// [`is_raw`](Self::is_raw) stays `false`, which tells writers to emit bare
/// LF.
///
/// # Example
///
/// ```no_run
/// use pace_term::terminal::Terminal;
///
/// let mut term = Terminal::new();
/// term.raw_mode()?;
/// // ... read keys ...
/// term.normal_mode()?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    input: RawFd,
    #[cfg(unix)]
    output: RawFd,

    /// Attributes saved by the last `raw_mode()`. `Some` means raw.
    #[cfg(unix)]
    original_termios: Option<libc::termios>,

    /// Last successfully queried size.
    size: Size,

    /// Request bracketed paste whenever raw mode is entered.
    bracketed_paste: bool,
    /// Bracketed paste was enabled by us and must be turned off again.
    paste_enabled: bool,
}

impl Terminal {
    /// A handle on stdin/stdout. Does not touch the terminal's mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            input: libc::STDIN_FILENO,
            #[cfg(unix)]
            output: libc::STDOUT_FILENO,
            #[cfg(unix)]
            original_termios: None,
            size: get_size().unwrap_or_default(),
            bracketed_paste: false,
            paste_enabled: false,
        }
    }

    /// Whether entering raw mode also enables bracketed paste.
    pub const fn set_bracketed_paste(&mut self, enabled: bool) {
        self.bracketed_paste = enabled;
    }

    /// Whether the input side is a terminal.
    #[cfg(unix)]
    #[must_use]
    pub fn is_tty(&self) -> bool {
        unsafe { libc::isatty(self.input) != 0 }
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn is_tty(&self) -> bool {
        false
    }

    /// Whether raw mode is currently in effect.
    #[inline]
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        #[cfg(unix)]
        {
            self.original_termios.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Re-query the terminal size. Keeps the last known size on failure.
    pub fn size(&mut self) -> Size {
        #[cfg(unix)]
        if let Some(s) = query_size(self.output) {
            self.size = s;
        }
        self.size
    }

    /// The last known size, without querying.
    #[inline]
    #[must_use]
    pub const fn cached_size(&self) -> Size {
        self.size
    }

    /// Enter raw mode.
    ///
    /// Saves the current attributes, applies the `cfmakeraw` flags, and
    /// enables bracketed paste if requested. A no-op when input is not a
    /// TTY or raw mode is already on.
    ///
    /// # Errors
    ///
    /// Returns an error if `tcgetattr`/`tcsetattr` or the paste request fails.
    pub fn raw_mode(&mut self) -> io::Result<()> {
        if self.is_raw() {
            return Ok(());
        }
        if !self.is_tty() {
            tracing::debug!(message = "input is not a tty, raw mode skipped");
            return Ok(());
        }

        install_panic_hook();
        self.enable_raw_mode()?;

        if self.bracketed_paste {
            let mut out = io::stdout().lock();
            ansi::enable_bracketed_paste(&mut out)?;
            out.flush()?;
            self.paste_enabled = true;
        }
        tracing::debug!(message = "raw mode on", paste = self.paste_enabled);
        Ok(())
    }

    /// Leave raw mode, restoring the saved attributes.
    ///
    /// A no-op when raw mode is off.
    ///
    /// # Errors
    ///
    /// Returns an error if the paste reset or `tcsetattr` fails.
    pub fn normal_mode(&mut self) -> io::Result<()> {
        if self.paste_enabled {
            let mut out = io::stdout().lock();
            ansi::disable_bracketed_paste(&mut out)?;
            out.flush()?;
            self.paste_enabled = false;
        }
        if self.is_raw() {
            self.disable_raw_mode()?;
            tracing::debug!(message = "raw mode off");
        }
        Ok(())
    }

    // ── Raw Mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(self.input, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some((self.input, termios));
            }

            // cfmakeraw equivalent.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;

            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const termios) != 0 {
                self.original_termios = None;
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            unsafe {
                if libc::tcsetattr(self.input, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("raw", &self.is_raw())
            .field("size", &self.size)
            .field("bracketed_paste", &self.bracketed_paste)
            .finish_non_exhaustive()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Err(err) = self.normal_mode() {
            tracing::warn!(message = "failed to restore terminal mode", %err);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn size_default_is_fallback() {
        assert_eq!(Size::default(), Size { cols: 80, rows: 24 });
    }

    #[test]
    fn get_size_does_not_panic() {
        let _ = get_size();
        let _ = is_tty();
    }

    #[test]
    fn emergency_restore_is_valid_utf8() {
        std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
    }

    #[test]
    fn emergency_restore_shows_cursor_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.ends_with("\x1b[?25h"));
    }

    #[test]
    fn emergency_restore_covers_every_mode_we_enable() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.contains("\x1b[?2026l"), "must end sync output");
        assert!(s.contains("\x1b[?1000l"), "must disable mouse clicks");
        assert!(s.contains("\x1b[?1003l"), "must disable mouse motion");
        assert!(s.contains("\x1b[?1006l"), "must disable SGR mouse format");
        assert!(s.contains("\x1b[?1016l"), "must disable pixel mouse");
        assert!(s.contains("\x1b[>0s"), "must reset shift reporting");
        assert!(s.contains("\x1b[?2004l"), "must disable bracketed paste");
        assert!(s.contains("\x1b[0m"), "must reset SGR attributes");
    }

    #[test]
    fn new_terminal_is_cooked() {
        let term = Terminal::new();
        assert!(!term.is_raw());
        let s = term.cached_size();
        assert!(s.cols > 0 && s.rows > 0);
    }

    #[test]
    fn size_keeps_a_usable_value() {
        let mut term = Terminal::new();
        let s = term.size();
        assert!(s.cols > 0 && s.rows > 0);
        assert_eq!(s, term.cached_size());
    }

    #[test]
    #[serial]
    fn raw_normal_cycle_ends_cooked() {
        let mut term = Terminal::new();
        for _ in 0..2 {
            term.raw_mode().unwrap();
            assert_eq!(term.is_raw(), term.is_tty());
            term.normal_mode().unwrap();
            assert!(!term.is_raw());
        }
    }

    #[test]
    #[serial]
    fn normal_mode_without_raw_is_noop() {
        let mut term = Terminal::new();
        term.normal_mode().unwrap();
        assert!(!term.is_raw());
    }
}
