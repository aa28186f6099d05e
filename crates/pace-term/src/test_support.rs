// SPDX-License-Identifier: MIT
//
// Test doubles for the input pipeline: a scripted byte source that blocks
// like a terminal until the test feeds it, and a shared in-memory sink.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::SurfaceConfig;
use crate::interrupt::InterruptReader;
use crate::reader::ThreadReader;
use crate::signals::Signals;
use crate::surface::Surface;

/// A `Read` source fed chunk by chunk from the test thread.
///
/// `read` blocks until a chunk arrives; when every [`Feeder`] is dropped the
/// source reports end-of-file (`Ok(0)`).
pub struct ScriptedInput {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

/// The sending half of a [`ScriptedInput`].
#[derive(Clone)]
pub struct Feeder {
    tx: Sender<Vec<u8>>,
}

impl ScriptedInput {
    pub fn new() -> (Self, Feeder) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx,
                pending: Vec::new(),
            },
            Feeder { tx },
        )
    }
}

impl Read for ScriptedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Feeder {
    /// Queue `bytes` immediately.
    pub fn send(&self, bytes: &[u8]) {
        let _ = self.tx.send(bytes.to_vec());
    }

    /// Queue `bytes` from another thread after `delay`.
    pub fn send_after(&self, delay: Duration, bytes: &[u8]) -> thread::JoinHandle<()> {
        let feeder = self.clone();
        let bytes = bytes.to_vec();
        thread::spawn(move || {
            thread::sleep(delay);
            feeder.send(&bytes);
        })
    }
}

/// An in-memory `Write` whose contents stay readable after the writer is
/// moved into a surface.
#[derive(Clone, Default)]
pub struct SharedSink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.lock().unwrap().clear();
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A surface over scripted input and a shared sink, with a signal watcher
/// that only receives [`Signals::raise`].
///
/// The surface caps the reader's timeout at one frame, so stop and restart
/// stay fast.
pub fn scripted_surface(config: SurfaceConfig) -> (Surface, Feeder, SharedSink, Arc<Signals>) {
    let (input, feeder) = ScriptedInput::new();
    let reader = InterruptReader::new(ThreadReader::new(input, Duration::from_millis(10)).into());
    let signals = Arc::new(Signals::new());
    reader.watch_signals(Arc::clone(&signals));
    let sink = SharedSink::default();
    let surface = Surface::with_reader(Arc::new(reader), sink.clone(), config);
    (surface, feeder, sink, signals)
}
