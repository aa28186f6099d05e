// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Timeout reader — one bounded-wait read at a time.
//
// The frame loop must never sit in a blocking `read()` on stdin: it has
// frames to pace, signals to drain, and partial escape sequences to time
// out. Every read therefore carries a deadline. Two implementations give
// the same contract:
//
//   PollReader — `poll()` on the descriptor with the current timeout, then
//   a single `read()` once the descriptor is ready. Synchronous, no extra
//   thread, and the preferred choice wherever file-descriptor readiness
//   exists (every unix).
//
//   ThreadReader — a dedicated thread performs blocking reads on any
//   `Read` source. The caller hands it a scratch buffer through a request
//   channel and waits on the reply channel with `recv_timeout()`. When a
//   wait times out the read stays in flight; the next call waits for that
//   same read instead of starting a new one, so no byte is ever lost or
//   duplicated. This is the only option where readiness polling does not
//   exist, and it also works over arbitrary `Read` implementations, which
//   is how the tests drive it.
//
// A timeout of zero means "block": reads behave exactly like the underlying
// `read()`. The timeout lives in a shared atomic (`TimeoutHandle`) so the
// owner can retune it while a producer thread is using the reader.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(unix)]
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use thiserror::Error;

use crate::error::{Error, Result};

/// Default bounded wait for a single read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

// ─── Timeout Handle ──────────────────────────────────────────────────────────

/// Shared, lock-free storage for a reader's timeout.
///
/// Cloning the handle shares the value: a change through any clone is seen
/// by the reader on its next wait.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    micros: Arc<AtomicU64>,
}

impl TimeoutHandle {
    /// A handle holding `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(to_micros(timeout))),
        }
    }

    /// The current timeout.
    #[must_use]
    pub fn get(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Acquire))
    }

    /// Replace the timeout. Zero means blocking reads.
    pub fn set(&self, timeout: Duration) {
        self.micros.store(to_micros(timeout), Ordering::Release);
    }
}

fn to_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

// ─── Capability Set ──────────────────────────────────────────────────────────

/// The operations every timeout reader provides.
///
/// `Ok(0)` from [`read`](Self::read) means "nothing arrived before the
/// deadline"; a clean end of file is [`Error::EndOfStream`].
pub trait TimedRead: Send {
    /// Read with the current timeout.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] at end of file or after [`close`](Self::close),
    /// [`Error::Truncated`] when an in-flight read was larger than `buf`,
    /// [`Error::Io`] for any other failure.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read ignoring the timeout for this one call.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read only what is available right now; `Ok(0)` if nothing is.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    fn read_immediate(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Change the bounded wait. Safe to call between reads.
    fn change_timeout(&self, timeout: Duration);

    /// The current bounded wait.
    fn timeout(&self) -> Duration;

    /// Stop reading. Subsequent reads fail with end-of-stream.
    fn close(&mut self);
}

// ─── Reader Kind ─────────────────────────────────────────────────────────────

/// Which timeout reader implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// Readiness polling on the descriptor (unix only).
    Poll,
    /// Blocking reads on a dedicated thread.
    Thread,
}

impl ReaderKind {
    /// The preferred implementation for the current platform.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(unix) { Self::Poll } else { Self::Thread }
    }
}

impl Default for ReaderKind {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poll => "poll",
            Self::Thread => "thread",
        })
    }
}

/// Returned when a reader kind name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reader kind {0:?} (expected \"poll\" or \"thread\")")]
pub struct ParseReaderKindError(String);

impl FromStr for ReaderKind {
    type Err = ParseReaderKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" | "select" => Ok(Self::Poll),
            "thread" => Ok(Self::Thread),
            _ => Err(ParseReaderKindError(s.to_owned())),
        }
    }
}

// ─── PollReader ──────────────────────────────────────────────────────────────

/// Timeout reader built on `poll()` readiness.
///
/// Owns its descriptor. For stdin, [`PollReader::stdin`] duplicates fd 0 so
/// dropping the reader never closes the process's standard input.
#[cfg(unix)]
#[derive(Debug)]
pub struct PollReader {
    fd: OwnedFd,
    timeout: TimeoutHandle,
    closed: bool,
}

#[cfg(unix)]
impl PollReader {
    /// Wrap an owned descriptor.
    #[must_use]
    pub fn new(fd: OwnedFd, timeout: Duration) -> Self {
        Self {
            fd,
            timeout: TimeoutHandle::new(timeout),
            closed: false,
        }
    }

    /// A reader over a duplicate of stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if `dup()` fails.
    pub fn stdin(timeout: Duration) -> io::Result<Self> {
        // SAFETY: `dup` only reads the descriptor table; the result is
        // checked before use.
        let raw = unsafe { libc::dup(libc::STDIN_FILENO) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `dup` returned a fresh descriptor that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self::new(fd, timeout))
    }

    /// A clone of the shared timeout handle.
    #[must_use]
    pub fn timeout_handle(&self) -> TimeoutHandle {
        self.timeout.clone()
    }

    /// Wait up to `timeout` for the descriptor to become readable.
    ///
    /// A wait cut short by a signal (`EINTR`) counts as "not ready".
    fn wait_ready(&self, timeout: Duration) -> io::Result<bool> {
        let ms = i32::try_from(timeout.as_micros().div_ceil(1000)).unwrap_or(i32::MAX);
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&raw mut pfd, 1, ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(ready > 0)
    }

    /// One `read()` on the descriptor. Zero bytes is end of stream.
    fn read_once(&self, buf: &mut [u8]) -> Result<usize> {
        let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(0),
                _ => Err(err.into()),
            };
        }
        if n == 0 {
            return Err(Error::EndOfStream);
        }
        #[allow(clippy::cast_sign_loss)] // n > 0 checked above.
        Ok(n as usize)
    }

    fn read_within(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if self.closed {
            return Err(Error::EndOfStream);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match timeout {
            None => self.read_once(buf),
            Some(t) => {
                if self.wait_ready(t)? {
                    self.read_once(buf)
                } else {
                    Ok(0)
                }
            }
        }
    }
}

#[cfg(unix)]
impl TimedRead for PollReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let timeout = self.timeout.get();
        let wait = (!timeout.is_zero()).then_some(timeout);
        self.read_within(buf, wait)
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_within(buf, None)
    }

    fn read_immediate(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_within(buf, Some(Duration::ZERO))
    }

    fn change_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ─── ThreadReader ────────────────────────────────────────────────────────────

/// What the reader thread sends back: the scratch buffer and the outcome.
type Reply = (Vec<u8>, io::Result<usize>);

/// Timeout reader built on a dedicated blocking-read thread.
#[derive(Debug)]
pub struct ThreadReader {
    /// Scratch buffers go to the thread here. `None` after close.
    requests: Option<Sender<Vec<u8>>>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
    /// A request was sent and its reply has not been received yet.
    in_flight: bool,
    /// Scratch buffer reused across requests.
    spare: Vec<u8>,
    /// Bytes from an oversize reply that did not fit the caller's buffer.
    retained: Vec<u8>,
    timeout: TimeoutHandle,
    closed: bool,
}

impl ThreadReader {
    /// Spawn the reader thread over `source`.
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot spawn a new thread (extremely rare).
    #[must_use]
    pub fn new<R>(source: R, timeout: Duration) -> Self
    where
        R: Read + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Vec<u8>>();
        let (rep_tx, rep_rx) = mpsc::channel::<Reply>();

        let handle = thread::Builder::new()
            .name("timeout-reader".into())
            .spawn(move || Self::reader_loop(source, &req_rx, &rep_tx))
            .expect("failed to spawn timeout reader thread");

        Self {
            requests: Some(req_tx),
            replies: rep_rx,
            handle: Some(handle),
            in_flight: false,
            spare: Vec::new(),
            retained: Vec::new(),
            timeout: TimeoutHandle::new(timeout),
            closed: false,
        }
    }

    /// A thread reader over the process's stdin.
    #[must_use]
    pub fn stdin(timeout: Duration) -> Self {
        Self::new(io::stdin(), timeout)
    }

    /// A clone of the shared timeout handle.
    #[must_use]
    pub fn timeout_handle(&self) -> TimeoutHandle {
        self.timeout.clone()
    }

    /// The reader thread: one blocking read per request, until the request
    /// channel closes or nobody listens for replies.
    fn reader_loop<R: Read>(mut source: R, requests: &Receiver<Vec<u8>>, replies: &Sender<Reply>) {
        while let Ok(mut buf) = requests.recv() {
            let result = loop {
                match source.read(&mut buf) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    other => break other,
                }
            };
            if replies.send((buf, result)).is_err() {
                break;
            }
        }
    }

    /// Copy retained bytes into `buf`.
    fn drain_retained(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.retained.len());
        buf[..n].copy_from_slice(&self.retained[..n]);
        self.retained.drain(..n);
        n
    }

    /// Hand a scratch buffer of `len` bytes to the reader thread.
    fn submit(&mut self, len: usize) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.spare);
        scratch.resize(len, 0);
        let Some(tx) = &self.requests else {
            return Err(Error::EndOfStream);
        };
        if tx.send(scratch).is_err() {
            return Err(Error::EndOfStream);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Turn a reply into the caller's result, keeping any overflow.
    fn deliver(&mut self, (scratch, result): Reply, buf: &mut [u8]) -> Result<usize> {
        self.in_flight = false;
        let outcome = match result {
            Ok(0) => Err(Error::EndOfStream),
            Err(err) => Err(err.into()),
            Ok(n) => {
                let copied = n.min(buf.len());
                buf[..copied].copy_from_slice(&scratch[..copied]);
                if n > copied {
                    self.retained.extend_from_slice(&scratch[copied..n]);
                    Err(Error::Truncated {
                        copied,
                        retained: n - copied,
                    })
                } else {
                    Ok(n)
                }
            }
        };
        self.spare = scratch;
        outcome
    }

    /// `None` waits forever, `Some(ZERO)` does not wait at all.
    fn read_within(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if !self.retained.is_empty() {
            return Ok(self.drain_retained(buf));
        }
        if self.closed {
            return Err(Error::EndOfStream);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        // Only start a new read when the previous one has been collected;
        // a timed-out read keeps running and its bytes belong to this call.
        if !self.in_flight {
            self.submit(buf.len())?;
        }
        let reply = match timeout {
            None => self.replies.recv().map_err(|_| Error::EndOfStream)?,
            Some(t) if t.is_zero() => match self.replies.try_recv() {
                Ok(reply) => reply,
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => return Err(Error::EndOfStream),
            },
            Some(t) => match self.replies.recv_timeout(t) {
                Ok(reply) => reply,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::EndOfStream),
            },
        };
        self.deliver(reply, buf)
    }
}

impl TimedRead for ThreadReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let timeout = self.timeout.get();
        let wait = (!timeout.is_zero()).then_some(timeout);
        self.read_within(buf, wait)
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_within(buf, None)
    }

    fn read_immediate(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_within(buf, Some(Duration::ZERO))
    }

    fn change_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    /// Disconnect the request channel and join the thread.
    ///
    /// A thread parked in a blocking `read()` cannot be woken portably; in
    /// that case it is detached and exits after its read completes.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.requests = None;
        if self.in_flight {
            tracing::debug!(message = "timeout reader closed with a read in flight, detaching thread");
            self.handle = None;
        } else if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadReader {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── TimeoutReader ───────────────────────────────────────────────────────────

/// A timeout reader of either kind, dispatched statically.
#[derive(Debug)]
pub enum TimeoutReader {
    /// `poll()`-based reader.
    #[cfg(unix)]
    Poll(PollReader),
    /// Thread-based reader.
    Thread(ThreadReader),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            #[cfg(unix)]
            TimeoutReader::Poll($r) => $body,
            TimeoutReader::Thread($r) => $body,
        }
    };
}

impl TimeoutReader {
    /// A reader over stdin of the requested kind.
    ///
    /// Falls back to the thread reader when polling is unavailable
    /// (non-unix) or stdin cannot be duplicated.
    #[must_use]
    pub fn stdin(kind: ReaderKind, timeout: Duration) -> Self {
        #[cfg(unix)]
        if kind == ReaderKind::Poll {
            match PollReader::stdin(timeout) {
                Ok(reader) => return Self::Poll(reader),
                Err(err) => {
                    tracing::warn!(message = "poll reader unavailable, using thread reader", %err);
                }
            }
        }
        #[cfg(not(unix))]
        if kind == ReaderKind::Poll {
            tracing::debug!(message = "poll reader unsupported on this platform, using thread reader");
        }
        Self::Thread(ThreadReader::stdin(timeout))
    }

    /// Which implementation this is.
    #[must_use]
    pub const fn kind(&self) -> ReaderKind {
        match self {
            #[cfg(unix)]
            Self::Poll(_) => ReaderKind::Poll,
            Self::Thread(_) => ReaderKind::Thread,
        }
    }

    /// A clone of the shared timeout handle.
    #[must_use]
    pub fn timeout_handle(&self) -> TimeoutHandle {
        dispatch!(self, r => r.timeout_handle())
    }
}

#[cfg(unix)]
impl From<PollReader> for TimeoutReader {
    fn from(reader: PollReader) -> Self {
        Self::Poll(reader)
    }
}

impl From<ThreadReader> for TimeoutReader {
    fn from(reader: ThreadReader) -> Self {
        Self::Thread(reader)
    }
}

impl TimedRead for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        dispatch!(self, r => r.read(buf))
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        dispatch!(self, r => r.read_blocking(buf))
    }

    fn read_immediate(&mut self, buf: &mut [u8]) -> Result<usize> {
        dispatch!(self, r => r.read_immediate(buf))
    }

    fn change_timeout(&self, timeout: Duration) {
        dispatch!(self, r => r.change_timeout(timeout));
    }

    fn timeout(&self) -> Duration {
        dispatch!(self, r => r.timeout())
    }

    fn close(&mut self) {
        dispatch!(self, r => r.close());
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
