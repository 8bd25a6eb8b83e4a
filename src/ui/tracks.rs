//! Track lane rendering.
//!
//! Each track gets a header line (name, format, own position) and a lane
//! row drawn at the current zoom. Played cells use the progress color,
//! the rest the wave color, and the playhead the cursor color.

use super::parse_color;
use crate::app::{format_time, App, LaneRegion, LaneWindow};
use crate::engine::Engine;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Header, lane, spacer.
const ROWS_PER_TRACK: u16 = 3;

const PLAYED: &str = "█";
const UNPLAYED: &str = "▆";
const CURSOR: &str = "┃";

/// Renders every visible lane and returns their regions for hit testing.
///
/// When the lanes do not fit, the list scrolls to keep the selected lane
/// on screen.
pub fn render_track_lanes<E: Engine>(
    frame: &mut Frame,
    area: Rect,
    app: &App<E>,
) -> Vec<LaneRegion> {
    let multitrack = &app.config.multitrack;
    let block = Block::default()
        .title(format!(" Tracks ({}) ", app.transport.tracks().len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(parse_color(&multitrack.track_border_color)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.transport.tracks().is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled(
                "No tracks. Press 'a' to add an MP3 or WAV file.",
                Style::default().fg(Color::DarkGray),
            )),
            inner,
        );
        return Vec::new();
    }

    let visible = (inner.height / ROWS_PER_TRACK).max(1) as usize;
    let first = app.selected.saturating_sub(visible - 1);
    let width = inner.width as usize;
    let zoom = app.transport.state().zoom_level;

    let mut regions = Vec::new();
    for (row, (index, track)) in app
        .transport
        .tracks()
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .enumerate()
    {
        let y = inner.y + row as u16 * ROWS_PER_TRACK;
        if y + 1 >= inner.y + inner.height {
            break;
        }
        let header_area = Rect::new(inner.x, y, inner.width, 1);
        let lane_area = Rect::new(inner.x, y + 1, inner.width, 1);

        let selected = index == app.selected;
        let duration = app.transport.track_duration(index);
        let position = app.transport.track_position(index).unwrap_or(0.0);

        let name_style = if selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let timing = match duration {
            Some(d) => format!("{} / {}", format_time(position), format_time(d)),
            None => "--:--".to_string(),
        };
        let header = Line::from(vec![
            Span::styled(if selected { "> " } else { "  " }, name_style),
            Span::styled(format!("{}. {}", index + 1, track.name()), name_style),
            Span::styled(
                format!(" [{}] ", track.format),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(timing, Style::default().fg(Color::Gray)),
        ]);
        frame.render_widget(Paragraph::new(header), header_area);

        let Some(duration) = duration else {
            let text = if app.transport.state().load_error.is_some() {
                "unavailable"
            } else {
                "loading..."
            };
            frame.render_widget(
                Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray))),
                lane_area,
            );
            continue;
        };

        let window = LaneWindow::new(duration, zoom, position, width);
        let drawn = (window.cells - window.offset).min(width);
        let cursor = window.cursor(position / duration);
        frame.render_widget(
            Paragraph::new(lane_line(app, window, drawn, cursor)),
            lane_area,
        );

        regions.push(LaneRegion {
            track_index: index,
            area: Rect::new(lane_area.x, lane_area.y, drawn as u16, 1),
            window,
        });
    }
    regions
}

fn lane_line<'a, E: Engine>(
    app: &App<E>,
    window: LaneWindow,
    drawn: usize,
    cursor: usize,
) -> Line<'a> {
    let waveform = &app.config.waveform;
    let played = Style::default().fg(parse_color(&waveform.progress_color));
    let unplayed = Style::default().fg(parse_color(&waveform.wave_color));
    let playhead = Style::default().fg(parse_color(&app.config.multitrack.cursor_color));

    let spans: Vec<Span> = (window.offset..window.offset + drawn)
        .map(|cell| {
            if cell == cursor {
                Span::styled(CURSOR, playhead)
            } else if cell < cursor {
                Span::styled(PLAYED, played)
            } else {
                Span::styled(UNPLAYED, unplayed)
            }
        })
        .collect();
    Line::from(spans)
}
