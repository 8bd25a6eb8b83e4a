//! Transport bar rendering.
//!
//! Displays the playback phase, shared position, volume, zoom and sync
//! policy, plus the current status message.

use crate::app::App;
use crate::engine::Engine;
use crate::transport::TransportPhase;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Returns the display color for a master volume in [0, 1].
#[inline]
fn volume_color(volume: f64) -> Color {
    if volume == 0.0 {
        Color::DarkGray
    } else if volume > 0.8 {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Renders the transport bar at the top of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_timeline<E: Engine>(frame: &mut Frame, area: Rect, app: &App<E>) {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // Phase
            Constraint::Length(26), // Position
            Constraint::Length(11), // Volume
            Constraint::Length(14), // Zoom
            Constraint::Length(18), // Sync policy
            Constraint::Min(10),    // Status
        ])
        .split(inner);

    let bold = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);
    let phase = match app.transport.phase() {
        TransportPhase::Uninitialized => Span::styled(" [ ] EMPTY ", bold(Color::DarkGray)),
        TransportPhase::Loading => Span::styled(" [~] LOAD ", bold(Color::Cyan)),
        TransportPhase::Paused => Span::styled(" [||] PAUSE ", bold(Color::Yellow)),
        TransportPhase::Playing => Span::styled(" [>] PLAY ", bold(Color::Green)),
        TransportPhase::Failed => Span::styled(" [!] ERROR ", bold(Color::Red)),
    };
    frame.render_widget(Paragraph::new(Line::from(phase)), chunks[0]);

    let label = Style::default().fg(Color::DarkGray);
    let state = app.transport.state();

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Pos: ", label),
            Span::styled(app.position_string(), bold(Color::White)),
        ])),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Vol: ", label),
            Span::styled(
                format!("{:.0}%", state.master_volume * 100.0),
                Style::default().fg(volume_color(state.master_volume)),
            ),
        ])),
        chunks[2],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Zoom: ", label),
            Span::styled(
                format!("{:.0}px/s", state.zoom_level),
                Style::default().fg(Color::White),
            ),
        ])),
        chunks[3],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Sync: ", label),
            Span::styled(
                format!("{:?}", app.transport.sync_policy()).to_lowercase(),
                Style::default().fg(Color::White),
            ),
        ])),
        chunks[4],
    );

    let status = if let Some((msg, _)) = &app.status_message {
        Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )
    } else if let Some(error) = &state.load_error {
        Span::styled(error.as_str(), Style::default().fg(Color::Red))
    } else {
        Span::raw("")
    };
    frame.render_widget(Paragraph::new(Line::from(status)), chunks[5]);
}
