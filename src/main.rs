//! pillplayer - A multi-track audio player for the terminal.
//!
//! Loads MP3 and WAV files as stacked lanes that play in sync, with shared
//! transport controls and click-to-scrub lanes.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- vocals.wav drums.wav bass.mp3
//! cargo run -- --config player.json --log pillplayer.log stems/*.wav
//! ```

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use pillplayer::{ui, App, PlayerConfig, RodioEngine};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Command-line options for the application.
struct CliOptions {
    /// Audio files to load on startup.
    files: Vec<PathBuf>,
    /// Path to a JSON player config.
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr.
    log: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--config <path>` or `-c <path>`: Load player settings from JSON
    /// - `--log <path>`: Write logs to a file
    /// - `--help` or `-h`: Print help and exit
    /// - anything else: an audio file to add
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut files = Vec::new();
        let mut config = None;
        let mut log = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" | "--log" => {
                    let flag = args[i].clone();
                    i += 1;
                    let Some(path) = args.get(i) else {
                        anyhow::bail!("{} requires a path argument", flag);
                    };
                    if flag == "--log" {
                        log = Some(PathBuf::from(path));
                    } else {
                        config = Some(PathBuf::from(path));
                    }
                }
                "--help" | "-h" => {
                    eprintln!("pillplayer - Multi-track audio player");
                    eprintln!();
                    eprintln!(
                        "Usage: {} [OPTIONS] [FILES]...",
                        args.first().map(String::as_str).unwrap_or("pillplayer")
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -c, --config PATH  Load player settings from a JSON file");
                    eprintln!("      --log PATH     Write logs to a file (level via RUST_LOG)");
                    eprintln!("  -h, --help         Print this help message");
                    eprintln!();
                    eprintln!("Supported files: MP3 (audio/mpeg), WAV (audio/wav).");
                    std::process::exit(0);
                }
                other if other.starts_with('-') && other.len() > 1 => {
                    anyhow::bail!("Unknown option: {} (use --help for usage)", other);
                }
                other => files.push(PathBuf::from(other)),
            }
            i += 1;
        }

        Ok(Self { files, config, log })
    }
}

/// Initializes tracing. Logs go to `log` when given, stderr otherwise.
fn init_logging(log: Option<&PathBuf>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse()?;
    init_logging(cli.log.as_ref())?;

    let config = match &cli.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    let engine = RodioEngine::new().context("Failed to open audio output")?;
    let mut app = App::new(engine, config);

    if !cli.files.is_empty() {
        let outcome = app.add_files(cli.files);
        for rejected in &outcome.rejected {
            eprintln!("Skipping {}: {}", rejected.file.path.display(), rejected.reason);
        }
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    // Release every source and binding before reporting.
    drop(app);
    result
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main event loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<RodioEngine>,
) -> Result<()> {
    loop {
        // Engine events, status expiry
        app.tick();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Short timeout so progress keeps flowing while idle
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        if app.should_quit {
            tracing::info!("Quitting");
            return Ok(());
        }
    }
}
