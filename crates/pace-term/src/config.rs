// SPDX-License-Identifier: MIT
//
// Surface configuration — frame rate, read timeout, and terminal options.

use std::time::Duration;

use crate::reader::{DEFAULT_TIMEOUT, ReaderKind};

/// Default frame rate for [`Surface::fps_ticks`](crate::surface::Surface::fps_ticks).
pub const DEFAULT_FPS: u32 = 60;

/// How a [`Surface`](crate::surface::Surface) reads input and paces frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Target frames per second. Zero is treated as one.
    pub fps: u32,

    /// Bounded wait for the producer's reads outside frame loops. While a
    /// surface is open the producer uses [`producer_timeout`](Self::producer_timeout)
    /// instead; restoring the surface puts this value back.
    pub timeout: Duration,

    /// Sleep out the rest of each frame, then read without waiting.
    ///
    /// Off: each tick waits up to one frame for input and returns as soon
    /// as bytes arrive, so typing gets the lowest latency.
    pub paced: bool,

    /// Timeout reader implementation for the global reader.
    pub reader: ReaderKind,

    /// Enable bracketed paste while in raw mode.
    pub bracketed_paste: bool,

    /// Watch SIGINT, SIGTERM, and SIGWINCH.
    pub watch_signals: bool,
}

impl SurfaceConfig {
    /// The duration of one frame, `1 / fps`.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    /// The producer's read quantum while a surface is open: the configured
    /// timeout, capped at one frame. Keeps the post-newline pause and
    /// `stop` within a frame.
    #[must_use]
    pub fn producer_timeout(&self) -> Duration {
        let frame = self.frame_duration();
        if self.timeout.is_zero() {
            frame
        } else {
            self.timeout.min(frame)
        }
    }

    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    #[must_use]
    pub const fn with_reader(mut self, reader: ReaderKind) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub const fn with_bracketed_paste(mut self, enabled: bool) -> Self {
        self.bracketed_paste = enabled;
        self
    }

    #[must_use]
    pub const fn with_watch_signals(mut self, enabled: bool) -> Self {
        self.watch_signals = enabled;
        self
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            timeout: DEFAULT_TIMEOUT,
            paced: false,
            reader: ReaderKind::default(),
            bracketed_paste: false,
            watch_signals: true,
        }
    }
}
