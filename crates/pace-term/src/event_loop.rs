// SPDX-License-Identifier: MIT
//
// Frame scheduler — the heartbeat of a surface.
//
// Every tick does the same four things, in order:
//
//   1. **Pace** (paced mode only): close any open sync block, flush, and
//      sleep out the rest of the frame since the previous tick. The read
//      below then does not wait at all.
//
//   2. **Drain signals**: a resize re-queries the size, runs the resize
//      callback and closes any open sync block; SIGINT or SIGTERM ends the
//      loop with `Interrupted(Signal)`.
//
//   3. **Read**: one bounded read on the interrupt reader, waiting at most
//      one frame (`1 / fps`). The bytes go through the decoder; whatever
//      it does not claim is keyboard input for this tick.
//
//   4. **Return** control to the application.
//
// Before the wait, any open synchronized-output block is closed and the
// output is flushed, so the frame the application just drew is on screen
// while we sleep.
//
// # Unpaced vs. paced
//
// Unpaced (the default), a tick returns as soon as bytes arrive: typing
// gets sub-frame latency, and an idle screen still ticks `fps` times per
// second for animation. Paced, ticks are evenly spaced and input waits for
// the next frame boundary.
//
// # Escape Sequence Timeout
//
// A lone ESC byte is ambiguous: it could be the Escape key or the start
// of a CSI sequence. The decoder reports it as a partial tail and we carry
// it. On the next tick where no new bytes arrive, the carried bytes are
// released as keyboard input. At 60 fps the Escape key lags by at most one
// frame.

use std::thread;
use std::time::{Duration, Instant};

use crate::ansi::{self, Rgb};
use crate::error::{Error, Interrupt, Result};
use crate::input::{self, Mouse};
use crate::signals::Signal;
use crate::surface::Surface;
use crate::terminal::Size;

// ─── Action & Event ──────────────────────────────────────────────────────────

/// What the application tells the scheduler to do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Continue running.
    Continue,
    /// Leave [`Surface::fps_ticks`] cleanly.
    Quit,
}

/// One thing that happened during a tick, as reported by
/// [`Surface::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Keyboard bytes, escape sequences included, in arrival order.
    Keys(Vec<u8>),
    Mouse(Mouse),
    /// A cursor-position report, 1-based as sent by the terminal.
    CursorReport { x: u16, y: u16 },
    Background(Rgb),
    Resize(Size),
    /// A fatal signal. The reader stays interrupted until restarted.
    Signal(Signal),
    /// Nothing arrived within the wait.
    Timeout,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

impl Surface {
    /// Call `tick` once per frame until it returns [`Action::Quit`].
    ///
    /// Before each call the scheduler has drained signals and read at most
    /// one frame's worth of input; see [`data`](Self::data),
    /// [`mouse`](Self::mouse), and [`input`](Self::input).
    ///
    /// # Errors
    ///
    /// Returns the first error from a tick or from `tick` itself: an
    /// [`Interrupted`](Error::Interrupted) error on Ctrl-C or a fatal
    /// signal, or a read error.
    pub fn fps_ticks<F>(&mut self, mut tick: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<Action>,
    {
        loop {
            let wait = self.pace()?;
            self.tick(wait)?;
            if tick(self)? == Action::Quit {
                return Ok(());
            }
        }
    }

    /// Block until keyboard input or a decoded event arrives. Resizes are
    /// handled (the callback runs) without returning.
    ///
    /// # Errors
    ///
    /// Same as [`fps_ticks`](Self::fps_ticks).
    pub fn read_or_resize_or_signal(&mut self) -> Result<()> {
        loop {
            let wait = self.config.frame_duration();
            if self.tick(wait)? {
                return Ok(());
            }
        }
    }

    /// Exactly one tick, waiting at most one frame. Returns whether
    /// keyboard input or a decoded event arrived.
    ///
    /// # Errors
    ///
    /// Same as [`fps_ticks`](Self::fps_ticks).
    pub fn read_or_resize_or_signal_once(&mut self) -> Result<bool> {
        let wait = self.pace()?;
        self.tick(wait)
    }

    /// One tick waiting at most `wait`, reported as events.
    ///
    /// A fatal signal becomes [`Event::Signal`] rather than an error.
    ///
    /// # Errors
    ///
    /// Ctrl-C, end of stream, cancellation, and read errors.
    pub fn poll_events(&mut self, wait: Duration) -> Result<Vec<Event>> {
        match self.tick(wait) {
            Ok(_) => {}
            Err(Error::Interrupted(Interrupt::Signal(sig))) => return Ok(vec![Event::Signal(sig)]),
            Err(err) => return Err(err),
        }

        let mut events = Vec::new();
        if self.resized {
            events.push(Event::Resize(self.size));
        }
        if let Some(pos) = self.input.cursor {
            events.push(Event::CursorReport { x: pos.x, y: pos.y });
        }
        if let Some(mouse) = self.input.mouse {
            events.push(Event::Mouse(mouse));
        }
        if let Some(color) = self.input.background {
            events.push(Event::Background(color));
        }
        if !self.data.is_empty() {
            events.push(Event::Keys(self.data.clone()));
        }
        if events.is_empty() {
            events.push(Event::Timeout);
        }
        Ok(events)
    }

    // ── Tick ────────────────────────────────────────────────────────

    /// The wait for the next read: one frame, or zero after the pacing
    /// sleep. The frame drawn since the last tick is on screen before the
    /// sleep starts.
    fn pace(&mut self) -> Result<Duration> {
        let frame = self.config.frame_duration();
        if !self.config.paced {
            return Ok(frame);
        }
        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < frame {
                self.end_sync_mode()?;
                thread::sleep(frame - elapsed);
            }
        }
        self.last_tick = Some(Instant::now());
        Ok(Duration::ZERO)
    }

    /// Run one tick, reading for at most `wait`. Returns whether keyboard
    /// input or a decoded event is available.
    pub(crate) fn tick(&mut self, wait: Duration) -> Result<bool> {
        self.data.clear();
        self.input.clear();
        self.resized = false;
        self.data.append(&mut self.carry);
        let carried = self.data.len();

        self.end_sync_mode()?;
        self.drain_signals()?;
        self.poll_size()?;

        let n = self.reader.read_timeout(&mut self.scratch, wait)?;
        self.data.extend_from_slice(&self.scratch[..n]);
        if self.data.is_empty() {
            return Ok(false);
        }
        tracing::trace!(message = "tick read", bytes = n, carried);

        let reader = &self.reader;
        let frame = self.config.frame_duration();
        let tail = input::decode(&mut self.data, &mut self.input, |dest| {
            reader.read_timeout(dest, frame).unwrap_or(0)
        });

        // A partial tail waits one tick for the rest of its bytes. If that
        // tick brings nothing, it is keyboard input after all.
        if tail > 0 && n > 0 {
            let start = self.data.len() - tail;
            self.carry.extend_from_slice(&self.data[start..]);
            self.data.truncate(start);
        }

        Ok(!self.data.is_empty() || !self.input.is_empty())
    }

    fn drain_signals(&mut self) -> Result<()> {
        let Some(signals) = self.signals.clone() else {
            return Ok(());
        };
        while let Some(sig) = signals.try_recv() {
            tracing::debug!(message = "signal received", signal = %sig);
            if sig.is_fatal() {
                return Err(Interrupt::Signal(sig).into());
            }
            self.handle_resize()?;
        }
        Ok(())
    }

    /// Without SIGWINCH, compare the size once per tick.
    fn poll_size(&mut self) -> Result<()> {
        let delivered = self.signals.as_ref().is_some_and(|s| s.delivers_resize());
        if !delivered && self.reader.size() != self.size {
            self.handle_resize()?;
        }
        Ok(())
    }

    fn handle_resize(&mut self) -> Result<()> {
        self.size = self.reader.size();
        self.resized = true;
        tracing::debug!(message = "resize", cols = self.size.cols, rows = self.size.rows);

        if let Some(mut callback) = self.on_resize.take() {
            let result = callback(self);
            // The callback may have installed a replacement.
            if self.on_resize.is_none() {
                self.on_resize = Some(callback);
            }
            result?;
        }

        // Always close sync: the callback may have drawn inside a block.
        ansi::end_sync(&mut self.out)?;
        self.in_sync = false;
        self.flush()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
