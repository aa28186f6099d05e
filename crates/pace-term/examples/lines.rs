// SPDX-License-Identifier: MIT
//
// pace-term lines — switch between a line prompt and a frame loop on one
// stdin reader.
//
// The prompt runs in raw mode: typed characters are not echoed, the line
// is printed back after Enter, and Ctrl-C is caught by the reader instead
// of killing the process. Output goes through a CRLF writer because raw
// mode disables the terminal's own newline translation.
//
// Commands: `spin` enters a frame loop (any key returns to the prompt),
// `quit` exits. Ctrl-C exits with status 130.
//
// Usage:
//   cargo run -p pace-term --example lines

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use pace_term::crlf::CrlfWriter;
use pace_term::reader::DEFAULT_TIMEOUT;
use pace_term::{Action, CancelToken, InterruptReader, Surface, SurfaceConfig};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

fn spin() -> pace_term::Result<()> {
    let mut surface = Surface::open(SurfaceConfig::default().with_fps(30))?;
    surface.hide_cursor()?;
    let mut frame = 0usize;
    let result = surface.fps_ticks(|surface| {
        if !surface.data().is_empty() {
            return Ok(Action::Quit);
        }
        frame += 1;
        let size = surface.size();
        surface.start_sync_mode()?;
        surface.clear_screen()?;
        surface.write_centered(size.rows / 2, &format!("{} press any key", SPINNER[frame % 4]))?;
        Ok(Action::Continue)
    });
    let restored = surface.restore();
    result.and(restored)
}

fn prompt(reader: &Arc<InterruptReader>) -> pace_term::Result<()> {
    let token = CancelToken::new();
    let mut out = CrlfWriter::new(io::stdout());

    loop {
        // Every loop turn, since the surface leaves raw mode and stops the
        // producer when it is restored.
        reader.raw_mode()?;
        out.set_enabled(reader.is_raw());
        if !reader.is_running() {
            reader.start(&token);
        }

        write!(out, "> ")?;
        out.flush()?;
        let line = reader.read_line()?;
        match line.trim() {
            "quit" => return Ok(()),
            "spin" => spin()?,
            other => writeln!(out, "you typed {other:?}")?,
        }
    }
}

fn main() -> ExitCode {
    let reader = InterruptReader::global(DEFAULT_TIMEOUT);
    let result = prompt(&reader);
    reader.stop();
    if let Err(e) = reader.normal_mode() {
        eprintln!("lines: failed to restore terminal: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_interrupt() => {
            println!();
            ExitCode::from(130)
        }
        Err(e) if e.is_end_of_stream() => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lines: {e}");
            ExitCode::FAILURE
        }
    }
}
