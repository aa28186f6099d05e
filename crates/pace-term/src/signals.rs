// SPDX-License-Identifier: MIT
//
// OS signal watcher — interrupt, terminate, and window-change.
//
// Each watched signal sets an `AtomicBool` from the signal handler (via
// `signal-hook`'s flag registration, which is async-signal-safe). Consumers
// drain the flags with `swap(false)`, which makes the watcher behave like a
// small lossy channel: several identical signals between two checks
// coalesce into one, which is exactly what resize handling wants.
//
// Two consumers share one watcher:
//
//   - the interrupt reader's producer takes only the fatal signals
//     (interrupt, terminate) and turns them into a sticky error;
//   - the frame scheduler takes resize first, then any fatal signal the
//     producer has not consumed yet.
//
// Platforms without SIGWINCH (and tests) use `Signals::new()`, which
// registers nothing; resize can then be injected with `raise`.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use signal_hook::SigId;

/// A watched signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT (or its console equivalent).
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGWINCH, or a synthesized window-size change.
    Resize,
}

impl Signal {
    /// Whether this signal ends an interactive session.
    #[inline]
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Resize)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
            Self::Resize => "resize",
        })
    }
}

/// Pending-signal flags shared between the OS handlers and the consumers.
pub struct Signals {
    interrupt: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
    resize: Arc<AtomicBool>,
    /// Whether real OS handlers back the flags (SIGWINCH is delivered).
    registered: bool,
    #[cfg(unix)]
    ids: Vec<SigId>,
}

impl Signals {
    /// A watcher with no OS registration. Signals arrive only via [`raise`](Self::raise).
    #[must_use]
    pub fn new() -> Self {
        Self {
            interrupt: Arc::new(AtomicBool::new(false)),
            terminate: Arc::new(AtomicBool::new(false)),
            resize: Arc::new(AtomicBool::new(false)),
            registered: false,
            #[cfg(unix)]
            ids: Vec::new(),
        }
    }

    /// Register handlers for SIGINT, SIGTERM, and SIGWINCH.
    ///
    /// While the watcher lives, SIGINT and SIGTERM no longer terminate the
    /// process; they are reported through [`try_recv`](Self::try_recv)
    /// instead. Handlers are unregistered on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be installed.
    #[cfg(unix)]
    pub fn watch() -> io::Result<Self> {
        use signal_hook::consts::{SIGINT, SIGTERM, SIGWINCH};

        let mut signals = Self::new();
        let pairs = [
            (SIGINT, Arc::clone(&signals.interrupt)),
            (SIGTERM, Arc::clone(&signals.terminate)),
            (SIGWINCH, Arc::clone(&signals.resize)),
        ];
        for (sig, flag) in pairs {
            // On error, drop unregisters whatever was already installed.
            signals.ids.push(signal_hook::flag::register(sig, flag)?);
        }
        signals.registered = true;
        tracing::debug!(message = "signal handlers installed", count = signals.ids.len());
        Ok(signals)
    }

    /// Non-unix: nothing to register; resize is synthesized by polling.
    ///
    /// # Errors
    ///
    /// Never fails on this platform.
    #[cfg(not(unix))]
    pub fn watch() -> io::Result<Self> {
        Ok(Self::new())
    }

    /// Whether window-change notifications come from the OS.
    ///
    /// When `false`, the scheduler polls the terminal size once per tick.
    #[inline]
    #[must_use]
    pub const fn delivers_resize(&self) -> bool {
        self.registered
    }

    /// Mark a signal as pending, as if the OS had delivered it.
    pub fn raise(&self, signal: Signal) {
        self.flag(signal).store(true, Ordering::Release);
    }

    /// Take one pending signal. Resize is reported before fatal signals.
    #[must_use]
    pub fn try_recv(&self) -> Option<Signal> {
        if self.resize.swap(false, Ordering::AcqRel) {
            return Some(Signal::Resize);
        }
        self.take_fatal()
    }

    /// Take a pending interrupt or terminate signal, leaving resize alone.
    #[must_use]
    pub fn take_fatal(&self) -> Option<Signal> {
        if self.interrupt.swap(false, Ordering::AcqRel) {
            Some(Signal::Interrupt)
        } else if self.terminate.swap(false, Ordering::AcqRel) {
            Some(Signal::Terminate)
        } else {
            None
        }
    }

    fn flag(&self, signal: Signal) -> &AtomicBool {
        match signal {
            Signal::Interrupt => &self.interrupt,
            Signal::Terminate => &self.terminate,
            Signal::Resize => &self.resize,
        }
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("registered", &self.registered)
            .field("interrupt", &self.interrupt.load(Ordering::Relaxed))
            .field("terminate", &self.terminate.load(Ordering::Relaxed))
            .field("resize", &self.resize.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for Signals {
    fn drop(&mut self) {
        #[cfg(unix)]
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
