// SPDX-License-Identifier: MIT
//
// pace-term — terminal input multiplexing for frame-paced applications.
//
// One background producer reads stdin through a bounded-wait reader and
// feeds a shared, Ctrl-C-aware byte queue. Line-oriented prompts and a
// frame-rate scheduler both consume from that queue, so an application can
// switch between "read a line" and "run at 60 fps" without ever having two
// readers racing on the same file descriptor.
//
// On top of the queue sits a drawing surface: buffered ANSI output with
// newline translation for raw mode, and a scheduler that multiplexes
// keyboard bytes, mouse reports, terminal replies, window resizes and
// termination signals into one tick.
//
// Terminal control is direct: raw termios, `poll(2)`, and ANSI escape
// sequences. No TUI framework sits underneath.

pub mod ansi;
pub mod cancel;
pub mod config;
pub mod crlf;
pub mod error;
pub mod event_loop;
pub mod input;
pub mod interrupt;
pub mod reader;
pub mod signals;
pub mod surface;
pub mod terminal;

#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use config::SurfaceConfig;
pub use error::{Error, Interrupt, Result};
pub use event_loop::{Action, Event};
pub use interrupt::InterruptReader;
pub use reader::{ReaderKind, TimedRead, TimeoutReader};
pub use signals::{Signal, Signals};
pub use surface::Surface;
pub use terminal::Size;
