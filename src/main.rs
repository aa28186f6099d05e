// SPDX-License-Identifier: MIT
//
// pace — a frame-paced terminal event viewer.
//
// Opens a pace-term surface on the controlling terminal and shows, frame by
// frame, everything the scheduler multiplexes: keyboard bytes, mouse
// reports, cursor and background replies, and resizes.
//
// Keys:
//
//   q       quit
//   c       ask for the cursor position
//   b       ask for the background color
//   Ctrl-C  interrupt (exit status 130)
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ status line (INVERSE)        │  ← row 0
//   ├──────────────────────────────┤
//   │ event history, newest last   │  ← rows 1 .. h - 1
//   ├──────────────────────────────┤
//   │ key help (centered)          │  ← last row
//   └──────────────────────────────┘
//
// stdout belongs to the UI, so logs only go to a file (`--log`).

use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pace_term::ansi::{Attr, Color};
use pace_term::input::Mouse;
use pace_term::{Action, ReaderKind, Surface, SurfaceConfig};

/// How many event lines are kept, independent of the screen height.
const HISTORY: usize = 512;

const HELP: &str = "q quit  ·  c cursor  ·  b background  ·  Ctrl-C interrupt";

/// Frame-paced terminal event viewer
#[derive(Parser, Debug)]
#[command(name = "pace")]
#[command(version)]
struct Args {
    /// Frames per second
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Sleep out every frame instead of returning as soon as input arrives
    #[arg(long)]
    paced: bool,

    /// Timeout reader implementation ("poll" or "thread")
    #[arg(long, default_value_t = ReaderKind::default())]
    reader: ReaderKind,

    /// Write logs to this file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not enable mouse tracking
    #[arg(long)]
    no_mouse: bool,

    /// Enable bracketed paste
    #[arg(long)]
    paste: bool,
}

fn setup_logging(path: &PathBuf, level: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_names(true),
        )
        .init();
    Ok(())
}

// ─── Viewer ─────────────────────────────────────────────────────────────────

/// Event history and the paint routine.
struct Viewer {
    history: VecDeque<String>,
    ticks: u64,
    mouse_enabled: bool,
    dirty: bool,
}

impl Viewer {
    const fn new(mouse_enabled: bool) -> Self {
        Self {
            history: VecDeque::new(),
            ticks: 0,
            mouse_enabled,
            dirty: true,
        }
    }

    fn push(&mut self, line: String) {
        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(line);
        self.dirty = true;
    }

    /// Record what the latest tick delivered and react to commands.
    fn on_tick(&mut self, surface: &mut Surface) -> pace_term::Result<Action> {
        self.ticks += 1;

        if surface.resized() {
            let size = surface.size();
            self.push(format!("resize   {}x{}", size.cols, size.rows));
        }
        let input = *surface.input();
        if let Some(pos) = input.cursor {
            self.push(format!("cursor   col {} row {}", pos.x, pos.y));
        }
        if let Some(mouse) = input.mouse {
            self.push(describe_mouse(mouse));
        }
        if let Some(rgb) = input.background {
            let tone = if rgb.is_dark() { "dark" } else { "light" };
            self.push(format!("bg       {rgb} ({tone})"));
        }

        let keys = surface.data().to_vec();
        if !keys.is_empty() {
            self.push(format!("keys     {}", keys.escape_ascii()));
        }
        for &key in &keys {
            match key {
                b'q' => return Ok(Action::Quit),
                b'c' => match surface.read_cursor_pos()? {
                    Some((x, y)) => self.push(format!("cursor   at ({x}, {y}), 0-based")),
                    None => self.push("cursor   no reply".to_owned()),
                },
                b'b' => match surface.read_background_color()? {
                    Some(rgb) => self.push(format!("bg       {rgb}")),
                    None => self.push("bg       no reply".to_owned()),
                },
                _ => {}
            }
        }

        if self.dirty {
            self.paint(surface)?;
            self.dirty = false;
        }
        Ok(Action::Continue)
    }

    fn paint(&self, surface: &mut Surface) -> pace_term::Result<()> {
        let size = surface.size();
        surface.start_sync_mode()?;
        surface.clear_screen()?;

        surface.set_attrs(Attr::INVERSE)?;
        let status = format!(
            " pace  {}x{}  {} fps  mouse {}  tick {}",
            size.cols,
            size.rows,
            surface.config().fps,
            if self.mouse_enabled { "on" } else { "off" },
            self.ticks,
        );
        surface.write_at(0, 0, &status)?;
        surface.clear_end_of_line()?;
        surface.reset_style()?;

        let rows = usize::from(size.rows.saturating_sub(2));
        let skip = self.history.len().saturating_sub(rows);
        for (row, line) in (1..).zip(self.history.iter().skip(skip)) {
            surface.write_at(0, row, line)?;
        }

        if self.history.is_empty() {
            surface.write_boxed("pace event viewer\n\ntype, click, or resize")?;
        }

        surface.set_fg(Color::CYAN)?;
        surface.write_centered(size.rows.saturating_sub(1), HELP)?;
        surface.reset_style()
    }
}

fn describe_mouse(mouse: Mouse) -> String {
    let what = if mouse.wheel_up() {
        "wheel up"
    } else if mouse.wheel_down() {
        "wheel down"
    } else if mouse.released() {
        "release"
    } else if mouse.left_click() {
        "left click"
    } else if mouse.middle_click() {
        "middle click"
    } else if mouse.right_click() {
        "right click"
    } else if mouse.left_drag() || mouse.middle_drag() || mouse.right_drag() {
        "drag"
    } else if mouse.moved() {
        "move"
    } else {
        "other"
    };
    let mut mods = String::new();
    for (on, name) in [(mouse.shift(), "+shift"), (mouse.alt(), "+alt"), (mouse.ctrl(), "+ctrl")] {
        if on {
            mods.push_str(name);
        }
    }
    format!("mouse    {what}{mods} at ({}, {}) code {}", mouse.x, mouse.y, mouse.buttons)
}

fn run(args: &Args) -> pace_term::Result<()> {
    let config = SurfaceConfig::default()
        .with_fps(args.fps)
        .with_paced(args.paced)
        .with_reader(args.reader)
        .with_bracketed_paste(args.paste);

    let mut surface = Surface::open(config)?;
    let mut viewer = Viewer::new(!args.no_mouse);

    surface.hide_cursor()?;
    if viewer.mouse_enabled {
        surface.mouse_click_on()?;
    }
    surface.set_on_resize(|surface| {
        surface.start_sync_mode()?;
        surface.clear_screen()
    });

    let result = surface.fps_ticks(|surface| viewer.on_tick(surface));
    let restored = surface.restore();
    result.and(restored)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = &args.log {
        if let Err(e) = setup_logging(path, &args.log_level) {
            eprintln!("pace: failed to open log file {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_interrupt() => {
            tracing::info!(message = "interrupted", cause = %e);
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("pace: {e}");
            ExitCode::FAILURE
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        let args = Args::parse_from(["pace"]);
        assert_eq!(args.fps, 60);
        assert!(!args.paced && !args.no_mouse && !args.paste);
        assert_eq!(args.reader, ReaderKind::default());
        assert_eq!(args.log_level, "info");
        assert!(args.log.is_none());
    }

    #[test]
    fn args_parse_reader_kind() {
        let args = Args::parse_from(["pace", "--reader", "thread", "--fps", "30", "--paced"]);
        assert_eq!(args.reader, ReaderKind::Thread);
        assert_eq!(args.fps, 30);
        assert!(args.paced);
        assert!(Args::try_parse_from(["pace", "--reader", "bogus"]).is_err());
    }

    #[test]
    fn history_is_bounded() {
        let mut viewer = Viewer::new(true);
        for i in 0..HISTORY + 10 {
            viewer.push(format!("line {i}"));
        }
        assert_eq!(viewer.history.len(), HISTORY);
        assert_eq!(viewer.history.front().map(String::as_str), Some("line 10"));
    }

    #[test]
    fn describes_mouse_reports() {
        let click = Mouse { buttons: 0, x: 3, y: 4, release: false };
        assert_eq!(describe_mouse(click), "mouse    left click at (3, 4) code 0");

        let wheel = Mouse { buttons: 64 | 4, x: 1, y: 1, release: false };
        assert_eq!(describe_mouse(wheel), "mouse    wheel up+shift at (1, 1) code 68");
    }
}
