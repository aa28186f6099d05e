// SPDX-License-Identifier: MIT
//
// Interrupt reader — a shared, Ctrl-C-aware byte queue over a timeout reader.
//
// A producer thread owns the timeout reader while running. Each iteration it
// checks for fatal signals, then for cancellation, then performs one bounded
// read and appends the bytes to a growable buffer. Consumers (a line reader
// at a prompt, the frame scheduler) take bytes out under one mutex and wait
// on one condition variable that is notified on every append, every error,
// and producer exit.
//
// Errors are sticky. Once the producer records one (Ctrl-C, end of stream, a
// fatal signal, cancellation), every read returns it as soon as the buffered
// bytes are drained, until `stop()` + `start()` resets the reader. Bytes
// that arrived before a Ctrl-C are still delivered; bytes after it are
// dropped.
//
// The terminal handle lives under the same mutex, so toggling raw mode
// cannot race a consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::{Error, Interrupt, Result, Sticky};
use crate::reader::{DEFAULT_TIMEOUT, ReaderKind, TimedRead, TimeoutHandle, TimeoutReader};
use crate::signals::Signals;
use crate::terminal::{Size, Terminal};

/// Capacity the buffer is reset to after a full drain.
const INITIAL_CAPACITY: usize = 256;

/// Bytes requested from the timeout reader per iteration.
const READ_CHUNK: usize = 256;

const CTRL_C: u8 = 0x03;

// ─── Shared State ────────────────────────────────────────────────────────────

struct State {
    buf: Vec<u8>,
    err: Option<Error>,
    running: bool,
    /// The last line ended in CR; a leading LF belongs to that terminator.
    skip_lf: bool,
    terminal: Terminal,
}

impl State {
    fn reset(&mut self) {
        self.buf.clear();
        self.buf.shrink_to(INITIAL_CAPACITY);
        self.err = None;
        self.skip_lf = false;
    }

    fn drop_skipped_lf(&mut self) {
        if self.skip_lf && !self.buf.is_empty() {
            if self.buf[0] == b'\n' {
                self.buf.remove(0);
            }
            self.skip_lf = false;
        }
    }

    /// Move up to `dest.len()` buffered bytes into `dest`.
    fn take_into(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.buf.len());
        dest[..n].copy_from_slice(&self.buf[..n]);
        self.buf.drain(..n);
        self.shrink_if_drained();
        n
    }

    fn shrink_if_drained(&mut self) {
        if self.buf.is_empty() {
            self.buf.shrink_to(INITIAL_CAPACITY);
        }
    }

    /// What a consumer gets when the buffer is empty: the sticky error, or
    /// `Stopped` when no producer will ever fill it.
    fn exhausted(&self) -> Option<Error> {
        match &self.err {
            Some(err) => Some(err.clone()),
            None if !self.running => Some(Interrupt::Stopped.into()),
            None => None,
        }
    }
}

struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.ready.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(&self, guard: MutexGuard<'a, State>, dur: Duration) -> MutexGuard<'a, State> {
        match self.ready.wait_timeout(guard, dur) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

/// Producer bookkeeping. Guarded separately so `stop()` can join without
/// holding the state lock the producer needs.
struct Worker {
    /// The timeout reader while no producer runs.
    reader: Option<TimeoutReader>,
    handle: Option<JoinHandle<TimeoutReader>>,
    /// Child of the caller's token; cancelled by `stop()`.
    stop: Option<CancelToken>,
    signals: Option<Arc<Signals>>,
}

// ─── InterruptReader ─────────────────────────────────────────────────────────

/// Thread-safe reader with Ctrl-C interception and signal merging.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct InterruptReader {
    shared: Arc<Shared>,
    timeout: TimeoutHandle,
    worker: Mutex<Worker>,
    closed: AtomicBool,
}

static GLOBAL: OnceLock<Arc<InterruptReader>> = OnceLock::new();

impl InterruptReader {
    /// Wrap a timeout reader. The producer is not started.
    ///
    /// A zero timeout is replaced by [`DEFAULT_TIMEOUT`]: the producer must
    /// wake up regularly to observe cancellation.
    #[must_use]
    pub fn new(reader: TimeoutReader) -> Self {
        let timeout = reader.timeout_handle();
        if timeout.get().is_zero() {
            timeout.set(DEFAULT_TIMEOUT);
        }
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buf: Vec::with_capacity(INITIAL_CAPACITY),
                    err: None,
                    running: false,
                    skip_lf: false,
                    terminal: Terminal::new(),
                }),
                ready: Condvar::new(),
            }),
            timeout,
            worker: Mutex::new(Worker {
                reader: Some(reader),
                handle: None,
                stop: None,
                signals: None,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// An interrupt reader over stdin.
    #[must_use]
    pub fn stdin(kind: ReaderKind, timeout: Duration) -> Self {
        Self::new(TimeoutReader::stdin(kind, timeout))
    }

    /// The process-wide reader over stdin, created on first use.
    ///
    /// `timeout` only matters for the first call; use
    /// [`change_timeout`](Self::change_timeout) afterwards.
    #[must_use]
    pub fn global(timeout: Duration) -> Arc<Self> {
        Self::global_with(ReaderKind::default(), timeout)
    }

    /// Like [`global`](Self::global), choosing the timeout reader kind.
    #[must_use]
    pub fn global_with(kind: ReaderKind, timeout: Duration) -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            tracing::debug!(message = "global interrupt reader created", %kind, ?timeout);
            Arc::new(Self::stdin(kind, timeout))
        }))
    }

    fn worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge fatal signals from `signals` into the error stream.
    ///
    /// Takes effect on the next [`start`](Self::start).
    pub fn watch_signals(&self, signals: Arc<Signals>) {
        self.worker().signals = Some(signals);
    }

    /// The signal watcher given to [`watch_signals`](Self::watch_signals).
    #[must_use]
    pub fn signals(&self) -> Option<Arc<Signals>> {
        self.worker().signals.clone()
    }

    // ── Producer lifecycle ──────────────────────────────────────────

    /// Launch the producer. Any running producer is stopped first, which
    /// also clears buffered bytes and the sticky error.
    ///
    /// Cancelling `token` ends the producer with
    /// [`Interrupt::ContextDone`].
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot spawn a new thread (extremely rare).
    pub fn start(&self, token: &CancelToken) {
        self.stop();

        let mut worker = self.worker();
        let Some(reader) = worker.reader.take() else {
            tracing::warn!(message = "interrupt reader has no timeout reader, not starting");
            return;
        };
        let stop = token.child();
        self.shared.lock().running = true;

        let producer = Producer {
            shared: Arc::clone(&self.shared),
            parent: token.clone(),
            stop: stop.clone(),
            signals: worker.signals.clone(),
            timeout: self.timeout.clone(),
        };
        let handle = thread::Builder::new()
            .name("interrupt-reader".into())
            .spawn(move || producer.run(reader))
            .expect("failed to spawn interrupt reader thread");

        worker.handle = Some(handle);
        worker.stop = Some(stop);
        tracing::debug!(message = "interrupt reader started");
    }

    /// Cancel the producer, wait for it, and reset buffer and sticky error.
    ///
    /// Returns within about one timeout quantum.
    pub fn stop(&self) {
        let mut worker = self.worker();
        if let Some(stop) = worker.stop.take() {
            stop.cancel();
        }
        if let Some(handle) = worker.handle.take() {
            match handle.join() {
                Ok(reader) => worker.reader = Some(reader),
                Err(_) => tracing::warn!(message = "interrupt reader thread panicked"),
            }
            tracing::debug!(message = "interrupt reader stopped");
        }
        drop(worker);

        let mut state = self.shared.lock();
        state.reset();
        state.running = false;
        drop(state);
        self.shared.ready.notify_all();
    }

    /// Stop the producer and close the timeout reader for good.
    pub fn close(&self) {
        self.stop();
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Some(reader) = self.worker().reader.as_mut() {
                reader.close();
            }
        }
    }

    /// Whether a producer is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Change the bounded wait used by the producer. Zero selects
    /// [`DEFAULT_TIMEOUT`].
    pub fn change_timeout(&self, timeout: Duration) {
        self.timeout
            .set(if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout });
    }

    /// The producer's current bounded wait.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    // ── Consumers ───────────────────────────────────────────────────

    /// Block until bytes are available, then copy as many as fit.
    ///
    /// # Errors
    ///
    /// The sticky error once the buffer is drained, or
    /// [`Interrupt::Stopped`] if no producer is running.
    pub fn read(&self, dest: &mut [u8]) -> Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.lock();
        loop {
            state.drop_skipped_lf();
            if !state.buf.is_empty() {
                return Ok(state.take_into(dest));
            }
            if let Some(err) = state.exhausted() {
                return Err(err);
            }
            state = self.shared.wait(state);
        }
    }

    /// Copy whatever is buffered right now; `Ok(0)` if nothing is.
    ///
    /// # Errors
    ///
    /// The sticky error when nothing is buffered.
    pub fn read_nonblocking(&self, dest: &mut [u8]) -> Result<usize> {
        let mut state = self.shared.lock();
        state.drop_skipped_lf();
        if !state.buf.is_empty() {
            return Ok(state.take_into(dest));
        }
        match &state.err {
            Some(err) => Err(err.clone()),
            None => Ok(0),
        }
    }

    /// Wait at most `wait` for bytes. `Ok(0)` when the wait runs out.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn read_timeout(&self, dest: &mut [u8], wait: Duration) -> Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + wait;
        let mut state = self.shared.lock();
        loop {
            state.drop_skipped_lf();
            if !state.buf.is_empty() {
                return Ok(state.take_into(dest));
            }
            if let Some(err) = state.exhausted() {
                return Err(err);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            state = self.shared.wait_timeout(state, deadline - now);
        }
    }

    /// Read up to the next CR, LF, or CR+LF. The terminator is consumed
    /// and not returned; invalid UTF-8 is replaced.
    ///
    /// A CR at the end of one chunk followed by LF at the start of the next
    /// is still a single terminator.
    ///
    /// # Errors
    ///
    /// The sticky error when no bytes of a new line are pending. A partial
    /// line cut off by an error is returned first; the error follows on the
    /// next call.
    pub fn read_line(&self) -> Result<String> {
        let mut line = Vec::new();
        let mut state = self.shared.lock();
        loop {
            state.drop_skipped_lf();
            if let Some(pos) = state.buf.iter().position(|&b| b == b'\r' || b == b'\n') {
                line.extend_from_slice(&state.buf[..pos]);
                let mut end = pos + 1;
                if state.buf[pos] == b'\r' {
                    match state.buf.get(end) {
                        Some(b'\n') => end += 1,
                        Some(_) => {}
                        None => state.skip_lf = true,
                    }
                }
                state.buf.drain(..end);
                state.shrink_if_drained();
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            line.append(&mut state.buf);
            state.shrink_if_drained();
            if let Some(err) = state.exhausted() {
                if line.is_empty() {
                    return Err(err);
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            state = self.shared.wait(state);
        }
    }

    // ── Terminal delegation ─────────────────────────────────────────

    /// Put the terminal into raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal attributes cannot be changed.
    pub fn raw_mode(&self) -> Result<()> {
        Ok(self.shared.lock().terminal.raw_mode()?)
    }

    /// Restore the terminal's original mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal attributes cannot be restored.
    pub fn normal_mode(&self) -> Result<()> {
        Ok(self.shared.lock().terminal.normal_mode()?)
    }

    /// Whether the terminal is in raw mode.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.shared.lock().terminal.is_raw()
    }

    /// Whether stdin is a terminal.
    #[must_use]
    pub fn is_tty(&self) -> bool {
        self.shared.lock().terminal.is_tty()
    }

    /// Query the terminal size (last known size on failure).
    #[must_use]
    pub fn size(&self) -> Size {
        self.shared.lock().terminal.size()
    }

    /// Enable bracketed paste whenever raw mode is entered.
    pub fn set_bracketed_paste(&self, enabled: bool) {
        self.shared.lock().terminal.set_bracketed_paste(enabled);
    }
}

impl std::fmt::Debug for InterruptReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("InterruptReader")
            .field("buffered", &state.buf.len())
            .field("running", &state.running)
            .field("err", &state.err)
            .field("timeout", &self.timeout.get())
            .finish_non_exhaustive()
    }
}

impl Drop for InterruptReader {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Producer ────────────────────────────────────────────────────────────────

struct Producer {
    shared: Arc<Shared>,
    /// The caller's token.
    parent: CancelToken,
    /// Child of `parent`, cancelled by `stop()` or on producer exit.
    stop: CancelToken,
    signals: Option<Arc<Signals>>,
    timeout: TimeoutHandle,
}

impl Producer {
    /// Fill the shared buffer until an error ends it. Hands the timeout
    /// reader back through the join handle.
    fn run(self, mut reader: TimeoutReader) -> TimeoutReader {
        let mut chunk = [0u8; READ_CHUNK];
        let exit: Error = loop {
            if let Some(sig) = self.signals.as_ref().and_then(|s| s.take_fatal()) {
                tracing::debug!(message = "fatal signal received", %sig);
                self.stop.cancel();
                break Interrupt::Signal(sig).into();
            }
            if self.stop.is_cancelled() {
                break if self.parent.is_cancelled() {
                    Interrupt::ContextDone.into()
                } else {
                    Interrupt::Stopped.into()
                };
            }

            let n = match reader.read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => n,
                // The chunk is never smaller than an in-flight request, but
                // keep what was copied; the rest comes on the next read.
                Err(Error::Truncated { copied, .. }) => copied,
                Err(err) => break err,
            };
            let data = &chunk[..n];
            tracing::trace!(message = "read", bytes = n);

            if let Some(pos) = data.iter().position(|&b| b == CTRL_C) {
                self.append(&data[..pos]);
                self.stop.cancel();
                break Interrupt::User.into();
            }
            self.append(data);

            // Give a line consumer the chance to take the line before more
            // input lands behind it.
            if matches!(data.last(), Some(b'\r' | b'\n')) {
                thread::sleep(self.timeout.get() / 5);
            }
        };

        let mut state = self.shared.lock();
        if state.err.is_none() {
            state.err = Some(exit);
        }
        state.running = false;
        tracing::debug!(message = "producer exited", err = %Sticky(&state.err));
        drop(state);
        self.shared.ready.notify_all();
        reader
    }

    fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.shared.lock().buf.extend_from_slice(bytes);
        self.shared.ready.notify_all();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ThreadReader;
    use crate::signals::Signal;
    use crate::test_support::{Feeder, ScriptedInput};
    use pretty_assertions::assert_eq;

    fn scripted(timeout_ms: u64) -> (InterruptReader, Feeder) {
        let (input, feeder) = ScriptedInput::new();
        let reader = ThreadReader::new(input, Duration::from_millis(timeout_ms));
        (InterruptReader::new(reader.into()), feeder)
    }

    fn started(timeout_ms: u64) -> (InterruptReader, Feeder, CancelToken) {
        let (reader, feeder) = scripted(timeout_ms);
        let token = CancelToken::new();
        reader.start(&token);
        (reader, feeder, token)
    }

    fn read_all(reader: &InterruptReader, want: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while out.len() < want {
            let n = reader.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    // ── Ctrl-C ──────────────────────────────────────────────────────

    #[test]
    fn ctrl_c_truncates_and_sticks() {
        let (reader, feeder, _token) = started(20);
        feeder.send(b"ab\x03cd");

        assert_eq!(read_all(&reader, 2), b"ab".to_vec());
        let mut buf = [0u8; 8];
        for _ in 0..3 {
            let err = reader.read(&mut buf).unwrap_err();
            assert_eq!(err.interrupt(), Some(Interrupt::User));
        }
    }

    #[test]
    fn restart_clears_sticky_error() {
        let (reader, feeder, token) = started(20);
        feeder.send(b"\x03");
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap_err().interrupt(), Some(Interrupt::User));

        reader.start(&token);
        feeder.send(b"ok");
        assert_eq!(read_all(&reader, 2), b"ok".to_vec());
    }

    // ── Blocking / non-blocking / bounded ───────────────────────────

    #[test]
    fn read_blocks_until_bytes_arrive() {
        let (reader, feeder, _token) = started(20);
        let _h = feeder.send_after(Duration::from_millis(50), b"late");
        assert_eq!(read_all(&reader, 4), b"late".to_vec());
    }

    #[test]
    fn read_nonblocking_returns_zero_when_empty() {
        let (reader, _feeder, _token) = started(20);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_nonblocking(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_nonblocking_reports_sticky_error_when_empty() {
        let (reader, feeder, _token) = started(20);
        drop(feeder);
        let mut buf = [0u8; 8];
        // Wait for the producer to record end of stream.
        assert!(reader.read(&mut buf).unwrap_err().is_end_of_stream());
        assert!(reader.read_nonblocking(&mut buf).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn read_timeout_expires_on_quiet_input() {
        let (reader, _feeder, _token) = started(20);
        let mut buf = [0u8; 8];
        let start = Instant::now();
        assert_eq!(reader.read_timeout(&mut buf, Duration::from_millis(40)).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn read_timeout_returns_early_with_data() {
        let (reader, feeder, _token) = started(20);
        let _h = feeder.send_after(Duration::from_millis(10), b"k");
        let mut buf = [0u8; 8];
        let mut got = 0;
        let start = Instant::now();
        while got == 0 && start.elapsed() < Duration::from_secs(2) {
            got = reader.read_timeout(&mut buf, Duration::from_millis(500)).unwrap();
        }
        assert_eq!(&buf[..got], b"k");
    }

    #[test]
    fn bytes_keep_arrival_order() {
        let (reader, feeder, _token) = started(20);
        let mut expected = Vec::new();
        for i in 0..20u8 {
            let chunk = [b'a' + i, b'0' + (i % 10)];
            expected.extend_from_slice(&chunk);
            feeder.send(&chunk);
        }
        assert_eq!(read_all(&reader, expected.len()), expected);
    }

    // ── Lines ───────────────────────────────────────────────────────

    #[test]
    fn read_line_handles_every_terminator() {
        let (reader, feeder, _token) = started(20);
        feeder.send(b"one\r\ntwo\nthree\rfour\n");
        assert_eq!(reader.read_line().unwrap(), "one");
        assert_eq!(reader.read_line().unwrap(), "two");
        assert_eq!(reader.read_line().unwrap(), "three");
        assert_eq!(reader.read_line().unwrap(), "four");
    }

    #[test]
    fn read_line_joins_crlf_split_across_chunks() {
        let (reader, feeder, _token) = started(20);
        feeder.send(b"a\r");
        assert_eq!(reader.read_line().unwrap(), "a");
        feeder.send(b"\nb\n");
        assert_eq!(reader.read_line().unwrap(), "b");
    }

    #[test]
    fn read_line_assembles_line_from_pieces() {
        let (reader, feeder, _token) = started(20);
        let _h1 = feeder.send_after(Duration::from_millis(5), b"hel");
        let _h2 = feeder.send_after(Duration::from_millis(60), b"lo\n");
        assert_eq!(reader.read_line().unwrap(), "hello");
    }

    #[test]
    fn partial_line_then_end_of_stream() {
        let (reader, feeder, _token) = started(20);
        feeder.send(b"tail");
        drop(feeder);
        assert_eq!(reader.read_line().unwrap(), "tail");
        assert!(reader.read_line().unwrap_err().is_end_of_stream());
    }

    // ── Stop / cancellation / signals ───────────────────────────────

    #[test]
    fn stop_reports_stopped() {
        let (reader, _feeder, _token) = started(20);
        reader.stop();
        assert!(!reader.is_running());
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap_err().interrupt(), Some(Interrupt::Stopped));
    }

    #[test]
    fn stop_wakes_a_blocked_reader() {
        let (reader, _feeder, _token) = started(20);
        let reader = Arc::new(reader);
        let blocked = {
            let reader = Arc::clone(&reader);
            thread::spawn(move || {
                let mut buf = [0u8; 8];
                reader.read(&mut buf)
            })
        };
        thread::sleep(Duration::from_millis(30));
        reader.stop();
        let err = blocked.join().unwrap().unwrap_err();
        assert_eq!(err.interrupt(), Some(Interrupt::Stopped));
    }

    #[test]
    fn external_cancellation_is_context_done() {
        let (reader, _feeder, token) = started(20);
        token.cancel();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap_err().interrupt(), Some(Interrupt::ContextDone));
    }

    #[test]
    fn fatal_signal_becomes_sticky_error() {
        let (reader, _feeder) = scripted(20);
        let signals = Arc::new(Signals::new());
        reader.watch_signals(Arc::clone(&signals));
        reader.start(&CancelToken::new());

        signals.raise(Signal::Terminate);
        let mut buf = [0u8; 8];
        assert_eq!(
            reader.read(&mut buf).unwrap_err().interrupt(),
            Some(Interrupt::Signal(Signal::Terminate))
        );
    }

    #[test]
    fn resize_is_left_for_the_scheduler() {
        let (reader, feeder) = scripted(20);
        let signals = Arc::new(Signals::new());
        reader.watch_signals(Arc::clone(&signals));
        reader.start(&CancelToken::new());

        signals.raise(Signal::Resize);
        feeder.send(b"x");
        assert_eq!(read_all(&reader, 1), b"x".to_vec());
        assert_eq!(signals.try_recv(), Some(Signal::Resize));
    }

    #[test]
    fn read_without_start_is_stopped() {
        let (reader, _feeder) = scripted(20);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap_err().interrupt(), Some(Interrupt::Stopped));
    }

    // ── Timeout ─────────────────────────────────────────────────────

    #[test]
    fn change_timeout_is_shared_with_the_reader() {
        let (reader, _feeder) = scripted(20);
        reader.change_timeout(Duration::from_millis(75));
        assert_eq!(reader.timeout(), Duration::from_millis(75));
        reader.change_timeout(Duration::ZERO);
        assert_eq!(reader.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn zero_timeout_is_replaced_on_construction() {
        let (reader, _feeder) = scripted(0);
        assert_eq!(reader.timeout(), DEFAULT_TIMEOUT);
    }

    // ── Terminal delegation ─────────────────────────────────────────

    #[test]
    #[serial_test::serial]
    fn normal_mode_leaves_terminal_cooked() {
        let (reader, _feeder) = scripted(20);
        reader.raw_mode().unwrap();
        assert_eq!(reader.is_raw(), reader.is_tty());
        reader.normal_mode().unwrap();
        assert!(!reader.is_raw());
        let size = reader.size();
        assert!(size.cols > 0 && size.rows > 0);
    }
}
