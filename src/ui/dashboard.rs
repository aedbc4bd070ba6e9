//! Reservoir and distribution tables.
//!
//! Values are drawn from the snapshot exactly as received. While the
//! gateway is disconnected the last known values stay on screen, dimmed
//! in the stale color.

use plantwatch_types::{ChannelId, ChannelKind, Measurement, Site, TelemetryReading};
use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use crate::app::App;

/// Sites fed by the distribution network, in display order.
const DISTRIBUTION_SITES: [Site; 3] = [Site::MatangBayu, Site::Lhoksukon, Site::Brigif];

/// One row of the distribution table.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow<'a> {
    pub site: Site,
    pub flow: Option<&'a Measurement>,
    pub volume: Option<&'a Measurement>,
    pub pressure: Option<&'a Measurement>,
}

/// Group the distribution channels of `reading` by site.
pub fn distribution_rows(reading: &TelemetryReading) -> Vec<DistributionRow<'_>> {
    DISTRIBUTION_SITES
        .iter()
        .map(|&site| {
            let find = |kind: ChannelKind| {
                ChannelId::ALL
                    .into_iter()
                    .find(|id| id.site() == site && id.kind() == kind)
                    .and_then(|id| reading.get(id))
            };
            DistributionRow {
                site,
                flow: find(ChannelKind::Flow),
                volume: find(ChannelKind::Volume),
                pressure: find(ChannelKind::Pressure),
            }
        })
        .collect()
}

/// Format a measured value with its unit, e.g. `4.326 NTU`.
pub fn format_measurement(measurement: Option<&Measurement>) -> String {
    match measurement {
        Some(m) if m.unit.is_empty() => format_value(m.value),
        Some(m) => format!("{} {}", format_value(m.value), m.unit),
        None => "-".to_string(),
    }
}

/// Up to three decimals, trailing zeros trimmed.
fn format_value(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn value_style(app: &App) -> Style {
    if app.snapshot.is_connected() {
        app.theme.value
    } else {
        Style::default().fg(app.theme.stale)
    }
}

fn block(app: &App, title: &str) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border))
}

/// Render the reservoir water quality table.
pub fn render_reservoir(frame: &mut Frame, app: &App, area: Rect) {
    let reading = app.snapshot.latest_reading();
    let style = value_style(app);

    let header = Row::new(vec![Cell::from("Parameter"), Cell::from("Value")])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = ChannelId::ALL
        .into_iter()
        .filter(|id| id.site() == Site::Reservoir)
        .map(|id| {
            Row::new(vec![
                Cell::from(id.label()),
                Cell::from(format_measurement(reading.get(id))).style(style),
            ])
        })
        .collect();

    let widths = [Constraint::Fill(2), Constraint::Fill(3)];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block(app, "Reservoir"));

    frame.render_widget(table, area);
}

/// Render the per-site distribution table: flow, cumulative volume, pressure.
pub fn render_distribution(frame: &mut Frame, app: &App, area: Rect) {
    let reading = app.snapshot.latest_reading();
    let style = value_style(app);

    let header = Row::new(vec![
        Cell::from("Site"),
        Cell::from("Flow"),
        Cell::from("Volume"),
        Cell::from("Pressure"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = distribution_rows(reading)
        .into_iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.site.name()),
                Cell::from(format_measurement(row.flow)).style(style),
                Cell::from(format_measurement(row.volume)).style(style),
                Cell::from(format_measurement(row.pressure)).style(style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Fill(3),
        Constraint::Fill(2),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block(app, "Distribution"));

    frame.render_widget(table, area);
}
