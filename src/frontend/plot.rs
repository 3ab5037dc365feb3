//! Chart rendering using egui_plot
//!
//! Each instrument panel is drawn as one plot: a line per series plus point
//! markers whose shape comes from the run's [`SymbolAssignment`]. Colors are
//! derived from the series position so that a series keeps its color across
//! renders of the same device.
//!
//! The x axis is Unix seconds, formatted back into wall-clock time.

use crate::pipeline::{InstrumentPanel, MarkerSymbol, SymbolAssignment};
use chrono::DateTime;
use egui::ecolor::Hsva;
use egui::{Color32, Ui};
use egui_plot::{Corner, GridMark, Legend, Line, MarkerShape, Plot, PlotPoints, Points};
use std::ops::RangeInclusive;

/// Chart appearance
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub height: f32,
    pub line_width: f32,
    pub marker_radius: f32,
    pub show_legend: bool,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            height: 300.0,
            line_width: 1.5,
            marker_radius: 3.0,
            show_legend: true,
        }
    }
}

/// Map a palette symbol onto an egui_plot marker
pub fn marker_shape(symbol: MarkerSymbol) -> MarkerShape {
    match symbol {
        MarkerSymbol::Circle => MarkerShape::Circle,
        MarkerSymbol::Diamond => MarkerShape::Diamond,
        MarkerSymbol::Square => MarkerShape::Square,
        MarkerSymbol::Cross => MarkerShape::Cross,
        MarkerSymbol::Plus => MarkerShape::Plus,
        MarkerSymbol::Up => MarkerShape::Up,
        MarkerSymbol::Down => MarkerShape::Down,
        MarkerSymbol::Left => MarkerShape::Left,
        MarkerSymbol::Right => MarkerShape::Right,
        MarkerSymbol::Asterisk => MarkerShape::Asterisk,
    }
}

/// Distinct series color, hues spread by the golden ratio
pub fn series_color(index: usize) -> Color32 {
    const GOLDEN_RATIO: f32 = 0.618_034;

    let hue = (index as f32 * GOLDEN_RATIO).fract();
    // Medium saturation and value stay readable on light and dark themes
    Hsva::new(hue, 0.7, 0.85, 1.0).into()
}

/// Format an x coordinate (Unix seconds) as a timestamp label
pub fn format_time_axis(seconds: f64) -> String {
    DateTime::from_timestamp(seconds as i64, 0)
        .map(|dt| dt.naive_utc().format("%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Draw the chart of one instrument panel
pub fn render_panel_chart(
    ui: &mut Ui,
    panel: &InstrumentPanel,
    symbols: &SymbolAssignment,
    style: &ChartStyle,
) {
    let mut plot = Plot::new(format!("chart_{}", panel.schema.name))
        .height(style.height)
        .x_axis_label("Time")
        .y_axis_label("Value")
        .x_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            format_time_axis(mark.value)
        });

    if style.show_legend {
        plot = plot.legend(
            Legend::default()
                .position(Corner::RightTop)
                .background_alpha(0.8),
        );
    }

    plot.show(ui, |plot_ui| {
        for (index, series) in panel.series.iter().enumerate() {
            let points = series.plot_points();
            if points.is_empty() {
                continue;
            }
            let color = series_color(index);

            let line = Line::new(series.key.as_str(), PlotPoints::from(points.clone()))
                .color(color)
                .width(style.line_width);
            plot_ui.line(line);

            let shape = symbols
                .get(&series.key)
                .map(marker_shape)
                .unwrap_or(MarkerShape::Circle);
            let markers = Points::new(series.key.as_str(), PlotPoints::from(points))
                .shape(shape)
                .color(color)
                .radius(style.marker_radius);
            plot_ui.points(markers);
        }
    });
}
