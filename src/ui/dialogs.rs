//! Add-file prompt rendering.

use super::centered_rect;
use crate::app::App;
use crate::engine::Engine;
use crate::source::SUPPORTED_AUDIO_FORMATS;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

/// Renders the popup for typing a file path to add.
pub fn render_add_dialog<E: Engine>(frame: &mut Frame, app: &App<E>) {
    let area = centered_rect(60, 30, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Add Track ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Length(1), // Path input
            Constraint::Length(1), // Spacer
            Constraint::Min(1),    // Instructions
        ])
        .split(inner);

    let formats: Vec<String> = SUPPORTED_AUDIO_FORMATS
        .iter()
        .map(|(_, format)| format.to_string())
        .collect();
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!("Path ({}):", formats.join(", ")),
            Style::default().fg(Color::White),
        )),
        chunks[0],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                app.input.as_str(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "_",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::RAPID_BLINK),
            ),
        ])),
        chunks[1],
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Cyan)),
            Span::styled(" add  ", Style::default().fg(Color::DarkGray)),
            Span::styled("Esc", Style::default().fg(Color::Cyan)),
            Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
        ])),
        chunks[3],
    );
}
