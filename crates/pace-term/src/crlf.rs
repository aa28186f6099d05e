// SPDX-License-Identifier: MIT
//
// LF → CR+LF translation for raw-mode output.
//
// Raw mode turns off the terminal's output post-processing (`OPOST`), so a
// bare `\n` moves the cursor down without returning it to column 0. Log
// lines and multi-line strings written in raw mode would staircase across
// the screen. `CrlfWriter` inserts the missing `\r` in front of every
// standalone LF.
//
// The writer is stateless across calls: a buffer that ends in CR followed by
// a buffer that starts with LF produces `\r\r\n`, which renders the same as
// `\r\n`. Reported byte counts are in terms of the caller's input, never the
// expanded output.

use std::io::{self, Write};

/// A `Write` adapter that expands solitary LF into CR+LF.
#[derive(Debug)]
pub struct CrlfWriter<W> {
    inner: W,
    enabled: bool,
}

impl<W: Write> CrlfWriter<W> {
    /// Wrap `inner` with translation enabled.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            enabled: true,
        }
    }

    /// Turn translation on or off.
    ///
    /// Off is the right setting when the sink is not a terminal in raw mode
    /// (pipes, files, cooked terminals): LF is then written as is.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether LF is currently being expanded.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Borrow the wrapped writer.
    #[inline]
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the wrapped writer.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap and return the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_translated(&mut self, buf: &[u8]) -> io::Result<usize> {
        // `start` is the first input byte not yet handed to the sink; it is
        // also the count reported back on partial failure.
        let mut start = 0;
        for (i, &b) in buf.iter().enumerate() {
            if b != b'\n' || (i > 0 && buf[i - 1] == b'\r') {
                continue;
            }
            let flushed = self
                .inner
                .write_all(&buf[start..i])
                .and_then(|()| self.inner.write_all(b"\r\n"));
            if let Err(err) = flushed {
                return if start > 0 { Ok(start) } else { Err(err) };
            }
            start = i + 1;
        }
        if start < buf.len() {
            if let Err(err) = self.inner.write_all(&buf[start..]) {
                return if start > 0 { Ok(start) } else { Err(err) };
            }
        }
        Ok(buf.len())
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.enabled {
            return self.inner.write(buf);
        }
        self.write_translated(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
