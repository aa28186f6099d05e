// SPDX-License-Identifier: MIT
//
// Error taxonomy for the input pipeline.
//
// Every fallible operation in this crate returns [`Result`]. The error is
// `Clone` because the interrupt reader keeps a *sticky* error: once the
// producer hits Ctrl-C, end-of-stream, or a fatal signal, every subsequent
// read hands back the same error until the reader is stopped and restarted.
// `io::Error` is not `Clone`, so it travels behind an `Arc`.
//
// Escape-sequence decoding has its own error type in `input.rs`. Decoder
// errors are handled inside the scheduler and never reach callers.

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::signals::Signal;

/// Why an interruptible read stopped delivering bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// Ctrl-C (byte `0x03`) appeared in the input stream.
    #[error("user interrupt")]
    User,
    /// The reader was stopped with [`InterruptReader::stop`](crate::interrupt::InterruptReader::stop).
    #[error("stopped")]
    Stopped,
    /// An OS signal other than resize arrived.
    #[error("signal received: {0}")]
    Signal(Signal),
    /// The external cancellation token fired.
    #[error("context done")]
    ContextDone,
}

/// Errors produced by the readers, the terminal handle, and the scheduler.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Reading was interrupted; see [`Interrupt`] for the cause.
    #[error("interrupted: {0}")]
    Interrupted(Interrupt),

    /// The underlying stream reported a clean end of file.
    #[error("end of stream")]
    EndOfStream,

    /// An in-flight read returned more bytes than the destination could
    /// hold. `copied` bytes were delivered; `retained` bytes are kept for
    /// the next read.
    #[error("read truncated: {copied} bytes copied, {retained} bytes retained")]
    Truncated {
        /// Bytes copied into the caller's buffer.
        copied: usize,
        /// Bytes held back for the next read.
        retained: usize,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl Error {
    /// Whether this error is one of the interrupt kinds (Ctrl-C, stop,
    /// signal, cancellation).
    ///
    /// The frame scheduler uses this to tell an intentional exit apart from
    /// a genuine I/O failure.
    #[inline]
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// The interrupt cause, if this is an interrupt.
    #[inline]
    #[must_use]
    pub const fn interrupt(&self) -> Option<Interrupt> {
        match self {
            Self::Interrupted(cause) => Some(*cause),
            _ => None,
        }
    }

    /// Whether the stream ended cleanly.
    #[inline]
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<Interrupt> for Error {
    fn from(cause: Interrupt) -> Self {
        Self::Interrupted(cause)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Display helper for the sticky error in debug logs.
pub(crate) struct Sticky<'a>(pub &'a Option<Error>);

impl fmt::Display for Sticky<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(err) => write!(f, "{err}"),
            None => f.write_str("none"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
