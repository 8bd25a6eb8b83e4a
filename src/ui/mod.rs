//! Terminal user interface components.
//!
//! The screen is a transport bar on top, one lane per track in the middle
//! and a key hint line at the bottom. The add-file prompt is drawn as a
//! popup over everything else.

mod dialogs;
mod timeline;
mod tracks;

use crate::app::{App, InputMode, LayoutRegions};
use crate::engine::Engine;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub use dialogs::render_add_dialog;
pub use timeline::render_timeline;
pub use tracks::render_track_lanes;

const KEY_HINTS: [(&str, &str); 10] = [
    ("Space", "play/pause"),
    ("←/→", "skip"),
    ("+/-", "volume"),
    ("[/]", "zoom"),
    ("↑/↓", "select"),
    ("0-9", "jump"),
    ("a", "add"),
    ("d", "remove"),
    ("s", "sync"),
    ("q", "quit"),
];

/// Parses a `#RRGGBB` or named color from the config.
///
/// Anything ratatui does not understand (including `transparent`) falls
/// back to the terminal default.
pub fn parse_color(value: &str) -> Color {
    value.parse().unwrap_or(Color::Reset)
}

/// Renders the complete UI and records lane regions for mouse hit testing.
pub fn render<E: Engine>(frame: &mut Frame, app: &mut App<E>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(4),    // Lanes
            Constraint::Length(1), // Key hints
        ])
        .split(frame.area());

    render_timeline(frame, chunks[0], app);
    let lanes = render_track_lanes(frame, chunks[1], app);
    app.layout = LayoutRegions { lanes };
    render_key_hints(frame, chunks[2]);

    if app.mode == InputMode::AddFile {
        render_add_dialog(frame, app);
    }
}

fn render_key_hints(frame: &mut Frame, area: Rect) {
    let mut spans = Vec::with_capacity(KEY_HINTS.len() * 2);
    for (key, action) in KEY_HINTS {
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default().fg(Color::Black).bg(Color::DarkGray),
        ));
        spans.push(Span::styled(
            format!(" {}  ", action),
            Style::default().fg(Color::Gray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::engine::mock::MockEngine;
    use crate::engine::{BindingEvent, EngineEvent};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::path::PathBuf;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#4F46E5"), Color::Rgb(0x4F, 0x46, 0xE5));
        assert_eq!(parse_color("transparent"), Color::Reset);
    }

    #[test]
    fn test_render_records_lane_regions() {
        let engine = MockEngine::new().with_duration("drums.wav", 40.0);
        let mut app = App::new(engine, PlayerConfig::default());
        app.add_files([PathBuf::from("drums.wav"), PathBuf::from("bass.mp3")]);
        let id = app.transport.binding_id().unwrap();
        app.transport.handle_event(BindingEvent {
            binding: id,
            event: EngineEvent::Ready,
        });

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(frame, &mut app)).unwrap();

        assert_eq!(app.layout.lanes.len(), 2);
        // 40 s at 5 px/s over 8 px cells.
        assert_eq!(app.layout.lanes[0].window.cells, 25);
        assert_eq!(app.layout.lanes[0].area.width, 25);
        let text = screen_text(&terminal);
        assert!(text.contains("drums.wav"));
        assert!(text.contains("bass.mp3"));
        assert!(text.contains("PAUSE"));
    }

    #[test]
    fn test_render_empty_and_prompt() {
        let mut app = App::new(MockEngine::default(), PlayerConfig::default());
        app.mode = InputMode::AddFile;
        app.input.push_str("song.mp3");

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(frame, &mut app)).unwrap();

        assert!(app.layout.lanes.is_empty());
        let text = screen_text(&terminal);
        assert!(text.contains("No tracks"));
        assert!(text.contains("song.mp3"));
    }
}
