//! Desk screen rendering
//!
//! One full-screen panel per state:
//! - Ready: scan trigger prompt
//! - Scanning: camera/reader hint plus the manual entry buffer
//! - Loading: progress indicator
//! - Result: large outcome symbol (○ blue, ◎ gold, × red)

use crate::domain::types::{AppState, VerificationOutcome};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const GOLD: Color = Color::Rgb(217, 166, 33);

const CIRCLE_ART: [&str; 7] = [
    "    ▄▄▄▄▄▄▄    ",
    "  ▄▀       ▀▄  ",
    " █           █ ",
    " █           █ ",
    " █           █ ",
    "  ▀▄       ▄▀  ",
    "    ▀▀▀▀▀▀▀    ",
];

const DOUBLE_CIRCLE_ART: [&str; 7] = [
    "    ▄▄▄▄▄▄▄    ",
    "  ▄▀       ▀▄  ",
    " █   ▄▀▀▀▄   █ ",
    " █   █   █   █ ",
    " █   ▀▄▄▄▀   █ ",
    "  ▀▄       ▄▀  ",
    "    ▀▀▀▀▀▀▀    ",
];

const CROSS_ART: [&str; 7] = [
    " ██         ██ ",
    "   ██     ██   ",
    "     ██ ██     ",
    "       █       ",
    "     ██ ██     ",
    "   ██     ██   ",
    " ██         ██ ",
];

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Everything the screen needs for one frame
#[derive(Debug, Clone)]
pub struct DeskView<'a> {
    pub desk_id: &'a str,
    pub build: &'a str,
    pub state: AppState,
    pub entry: &'a str,
    pub manual_entry: bool,
    pub admitted: u64,
    pub rejected: u64,
    pub tick: usize,
}

pub fn outcome_color(outcome: VerificationOutcome) -> Color {
    match outcome {
        VerificationOutcome::Success => Color::Blue,
        VerificationOutcome::Priority => GOLD,
        VerificationOutcome::Failure => Color::Red,
    }
}

fn outcome_art(outcome: VerificationOutcome) -> &'static [&'static str; 7] {
    match outcome {
        VerificationOutcome::Success => &CIRCLE_ART,
        VerificationOutcome::Priority => &DOUBLE_CIRCLE_ART,
        VerificationOutcome::Failure => &CROSS_ART,
    }
}

fn outcome_label(outcome: VerificationOutcome) -> &'static str {
    match outcome {
        VerificationOutcome::Success => "WELCOME",
        VerificationOutcome::Priority => "PRIORITY ENTRY",
        VerificationOutcome::Failure => "NOT ADMITTED",
    }
}

pub fn draw(f: &mut Frame, view: &DeskView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // State panel
            Constraint::Length(3), // Key hints
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);
    draw_body(f, chunks[1], view);
    draw_footer(f, chunks[2], view);
}

fn draw_header(f: &mut Frame, area: Rect, view: &DeskView) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Check-in ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(view.desk_id),
        Span::raw(" | "),
        Span::styled(view.state.as_str(), Style::default().fg(Color::Yellow)),
        Span::raw(" | In: "),
        Span::styled(view.admitted.to_string(), Style::default().fg(Color::Green)),
        Span::raw(" Rejected: "),
        Span::styled(view.rejected.to_string(), Style::default().fg(Color::Red)),
        Span::styled(format!(" | {}", view.build), Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_body(f: &mut Frame, area: Rect, view: &DeskView) {
    let (lines, border) = match view.state {
        AppState::Ready => (ready_lines(), Color::Cyan),
        AppState::Scanning => (scanning_lines(view), Color::Yellow),
        AppState::Loading => (loading_lines(view.tick), Color::DarkGray),
        AppState::Result(outcome) => (result_lines(outcome), outcome_color(outcome)),
    };

    let block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(border));
    let inner_height = block.inner(area).height as usize;
    let padding = inner_height.saturating_sub(lines.len()) / 2;

    let mut centered = vec![Line::raw(""); padding];
    centered.extend(lines);

    let body = Paragraph::new(centered).alignment(Alignment::Center).block(block);
    f.render_widget(body, area);
}

fn ready_lines() -> Vec<Line<'static>> {
    vec![
        Line::styled(
            "[ Scan QR code ]",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::styled("Press Enter to start", Style::default().fg(Color::DarkGray)),
    ]
}

fn scanning_lines<'a>(view: &DeskView<'a>) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::styled(
            "Hold the QR code up to the reader",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
    ];

    if view.manual_entry {
        lines.push(Line::from(vec![
            Span::raw("Code: "),
            Span::styled(view.entry, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("_", Style::default().fg(Color::DarkGray)),
        ]));
    }
    lines
}

fn loading_lines(tick: usize) -> Vec<Line<'static>> {
    let frame = SPINNER[tick % SPINNER.len()];
    vec![Line::styled(
        format!("{} Verifying {}", frame, frame),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )]
}

fn result_lines(outcome: VerificationOutcome) -> Vec<Line<'static>> {
    let style = Style::default().fg(outcome_color(outcome)).add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> =
        outcome_art(outcome).iter().map(|row| Line::styled(*row, style)).collect();
    lines.push(Line::raw(""));
    lines.push(Line::styled(format!("{}  {}", outcome.symbol(), outcome_label(outcome)), style));
    lines
}

fn draw_footer(f: &mut Frame, area: Rect, view: &DeskView) {
    let hint = match view.state {
        AppState::Ready => "Enter/Space: scan | q: quit",
        AppState::Scanning if view.manual_entry => "type code + Enter | Esc: cancel",
        AppState::Scanning => "Esc: cancel",
        AppState::Loading => "waiting for roster | q: quit",
        AppState::Result(_) => "next guest in a moment | q: quit",
    };
    let footer = Paragraph::new(Line::styled(hint, Style::default().fg(Color::DarkGray)))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
