//! Application state and event handling.
//!
//! This module sits between the terminal and the [`TransportController`]:
//! key presses and mouse clicks become transport commands, and command
//! outcomes become status messages.

use crate::config::PlayerConfig;
use crate::engine::Engine;
use crate::source::SourceFile;
use crate::sync::SyncPolicy;
use crate::transport::{AddOutcome, CommandOutcome, TransportController};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long a status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Pixels covered by one terminal cell of a lane.
pub const PX_PER_CELL: f64 = 8.0;

/// What keyboard input is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Transport shortcuts.
    #[default]
    Normal,
    /// Typing a path to add.
    AddFile,
}

/// The visible slice of a lane.
///
/// A lane is `cells` cells long at the current zoom; `offset` is the first
/// cell drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneWindow {
    pub cells: usize,
    pub offset: usize,
}

impl LaneWindow {
    /// Computes the window for a lane of `duration` seconds, `width` cells
    /// wide, scrolled so the playhead at `position` stays visible.
    pub fn new(duration: f64, zoom: f64, position: f64, width: usize) -> Self {
        let cells = ((duration * zoom / PX_PER_CELL).ceil() as usize).max(1);
        if cells <= width || duration <= 0.0 {
            return Self { cells, offset: 0 };
        }
        let cursor = Self::cell_at(cells, position / duration);
        let offset = cursor.saturating_sub(width / 2).min(cells - width);
        Self { cells, offset }
    }

    fn cell_at(cells: usize, normalized: f64) -> usize {
        ((normalized.clamp(0.0, 1.0) * cells as f64) as usize).min(cells - 1)
    }

    /// Cell holding the playhead.
    pub fn cursor(&self, normalized: f64) -> usize {
        Self::cell_at(self.cells, normalized)
    }

    /// Normalized lane position of the column `col` cells into the window.
    pub fn normalized_at(&self, col: usize) -> f64 {
        ((self.offset + col) as f64 / self.cells as f64).clamp(0.0, 1.0)
    }
}

/// A lane as last drawn, for mouse hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneRegion {
    pub track_index: usize,
    pub area: Rect,
    pub window: LaneWindow,
}

/// Screen regions recorded during rendering.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegions {
    /// Lane row of each visible track, top to bottom.
    pub lanes: Vec<LaneRegion>,
}

/// The terminal application.
pub struct App<E: Engine> {
    pub transport: TransportController<E>,
    pub config: PlayerConfig,
    /// Lane with keyboard focus.
    pub selected: usize,
    pub mode: InputMode,
    /// Path being typed in [`InputMode::AddFile`].
    pub input: String,
    /// Status message with timestamp (for auto-clear).
    pub status_message: Option<(String, Instant)>,
    pub layout: LayoutRegions,
    pub should_quit: bool,
}

impl<E: Engine> App<E> {
    pub fn new(engine: E, config: PlayerConfig) -> Self {
        let transport = TransportController::new(engine, &config);
        Self {
            transport,
            config,
            selected: 0,
            mode: InputMode::Normal,
            input: String::new(),
            status_message: None,
            layout: LayoutRegions::default(),
            should_quit: false,
        }
    }

    /// Sets a status message to display.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    /// Per-frame update: engine events, status expiry, selection bounds.
    pub fn tick(&mut self) {
        self.transport.pump();
        self.clear_expired_status();
        self.clamp_selection();
    }

    /// Adds files by path.
    pub fn add_files(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> AddOutcome {
        let outcome = self
            .transport
            .add_tracks(paths.into_iter().map(SourceFile::from_path));
        let message = match (outcome.added.len(), outcome.rejected.as_slice()) {
            (0, []) => "Nothing to add".to_string(),
            (0, [only]) => format!("Skipped {}: {}", only.file.name, only.reason),
            (added, []) => format!("Added {} track(s)", added),
            (added, rejected) => format!("Added {} track(s), skipped {}", added, rejected.len()),
        };
        self.set_status(message);
        outcome
    }

    /// Removes the selected track.
    pub fn remove_selected(&mut self) {
        let Some(track) = self.transport.tracks().track_at(self.selected) else {
            return;
        };
        let (id, name) = (track.id, track.name().to_string());
        if self.transport.remove_track(id) {
            self.set_status(format!("Removed {}", name));
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let count = self.transport.tracks().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    /// Reports commands that were swallowed because nothing is loaded yet.
    fn report(&mut self, outcome: CommandOutcome) {
        if outcome == CommandOutcome::NotReady {
            let message = if self.transport.tracks().is_empty() {
                "Add some tracks first"
            } else {
                "Still loading..."
            };
            self.set_status(message);
        }
    }

    pub fn change_volume(&mut self, delta: f64) {
        let volume = self.transport.state().master_volume + delta;
        self.transport.set_volume(volume);
    }

    pub fn change_zoom(&mut self, delta: f64) {
        let zoom = self.config.zoom.clamp(self.transport.state().zoom_level + delta);
        self.transport.set_zoom(zoom);
    }

    /// Scrubs lane `index` to `normalized` and follows with the others.
    pub fn scrub(&mut self, index: usize, normalized: f64) {
        self.selected = index;
        let outcome = self.transport.interact(index, normalized);
        self.report(outcome);
    }

    pub fn toggle_sync_policy(&mut self) {
        let next = match self.transport.sync_policy() {
            SyncPolicy::Proportional => SyncPolicy::Absolute,
            SyncPolicy::Absolute => SyncPolicy::Proportional,
        };
        self.transport.set_sync_policy(next);
        self.set_status(format!("Sync: {:?}", next));
    }

    /// Handles a key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::AddFile => self.handle_input_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let skip = self.config.skip_seconds;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => {
                let outcome = self.transport.toggle_play();
                self.report(outcome);
            }
            KeyCode::Left => {
                let outcome = self.transport.skip(-skip);
                self.report(outcome);
            }
            KeyCode::Right => {
                let outcome = self.transport.skip(skip);
                self.report(outcome);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(self.config.volume_step),
            KeyCode::Char('-') => self.change_volume(-self.config.volume_step),
            KeyCode::Char(']') => self.change_zoom(self.config.zoom.step),
            KeyCode::Char('[') => self.change_zoom(-self.config.zoom.step),
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected += 1;
                self.clamp_selection();
            }
            KeyCode::Char(c @ '0'..='9') => {
                let tenths = c.to_digit(10).unwrap_or(0) as f64;
                if !self.transport.tracks().is_empty() {
                    self.scrub(self.selected, tenths / 10.0);
                }
            }
            KeyCode::Char('a') => {
                self.mode = InputMode::AddFile;
                self.input.clear();
            }
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
            KeyCode::Char('s') => self.toggle_sync_policy(),
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                self.input.clear();
            }
            KeyCode::Enter => {
                self.mode = InputMode::Normal;
                let path = std::mem::take(&mut self.input);
                let path = path.trim().trim_matches(|c: char| c == '"' || c == '\'');
                if !path.is_empty() {
                    self.add_files([PathBuf::from(path)]);
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    /// Handles a mouse event. A left click on a lane scrubs it.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) || self.mode != InputMode::Normal
        {
            return;
        }
        let hit = self.layout.lanes.iter().copied().find(|lane| {
            let area = lane.area;
            mouse.column >= area.x
                && mouse.column < area.x + area.width
                && mouse.row >= area.y
                && mouse.row < area.y + area.height
        });
        if let Some(lane) = hit {
            let col = (mouse.column - lane.area.x) as usize;
            self.scrub(lane.track_index, lane.window.normalized_at(col));
        }
    }

    /// Shared playhead and total length, e.g. `1:05.3 / 3:20.0`.
    pub fn position_string(&self) -> String {
        let position = format_time(self.transport.state().current_position);
        match self.transport.duration() {
            Some(duration) => format!("{} / {}", position, format_time(duration)),
            None => format!("{} / --:--", position),
        }
    }
}

/// Formats seconds as `m:ss.t`.
pub fn format_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let secs = (tenths % 600) / 10;
    format!("{}:{:02}.{}", minutes, secs, tenths % 10)
}
