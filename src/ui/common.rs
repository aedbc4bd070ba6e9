//! Header bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::duration::format_duration;

/// Render the header bar.
///
/// Displays: connection indicator, endpoint, session state, reading timestamp.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.snapshot.connection_status();
    let status_style = app.theme.status_style(status);

    let line = Line::from(vec![
        Span::styled(" ● ", status_style),
        Span::styled("PLANTWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(status.label(), status_style),
        Span::raw(format!(" ({}) │ ", app.session_state)),
        Span::raw(app.endpoint().to_string()),
        Span::raw(" │ Reading "),
        Span::styled(
            app.snapshot.latest_reading().timestamp().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// Shows the gate counters, time since the last accepted reading, and
/// the available controls. Temporary status messages take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let updated = match app.last_update {
        Some(at) => format!("Updated {} ago", format_duration(at.elapsed())),
        None => "Showing last known values".to_string(),
    };
    let stats = &app.stats;
    let connect = if app.snapshot.is_connected() {
        "c:disconnect"
    } else {
        "c:connect"
    };

    let status = format!(
        " {} | accepted {} throttled {} malformed {} offline {} | {} ?:help q:quit",
        updated, stats.accepted, stats.throttled, stats.malformed, stats.dropped_offline, connect,
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Gateway", bold)]),
        Line::from("  c         Connect / disconnect"),
        Line::from(""),
        Line::from(vec![Span::styled(" General", bold)]),
        Line::from("  ?         Toggle this help"),
        Line::from("  q Esc     Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 12u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
