//! Tabular view of wide reading rows

use crate::types::{InstrumentSchema, RawReading};
use egui::{Color32, RichText, Ui};

/// Timestamp format used in the table
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format one cell value; missing values are shown as a dash
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "—".to_string()
    } else {
        format!("{:.4}", value)
    }
}

/// Draw the rows of one instrument panel, newest first
pub fn render_readings_table(
    ui: &mut Ui,
    schema: &InstrumentSchema,
    rows: &[RawReading],
    max_height: f32,
) {
    let row_height = ui.text_style_height(&egui::TextStyle::Body) + 4.0;

    egui::ScrollArea::vertical()
        .id_salt(format!("table_scroll_{}", schema.name))
        .max_height(max_height)
        .auto_shrink([false, true])
        .show_rows(ui, row_height, rows.len(), |ui, range| {
            egui::Grid::new(format!("table_{}", schema.name))
                .striped(true)
                .num_columns(schema.channel_count() + 2)
                .show(ui, |ui| {
                    for header in schema.table_headers() {
                        ui.label(RichText::new(header).strong());
                    }
                    ui.end_row();

                    for row in &rows[range] {
                        ui.monospace(row.timestamp.format(TIMESTAMP_FORMAT).to_string());
                        ui.label(&row.instrument);
                        for channel in 0..schema.channel_count() {
                            let value = row.value(channel);
                            if value.is_nan() {
                                ui.colored_label(Color32::GRAY, format_value(value));
                            } else {
                                ui.monospace(format_value(value));
                            }
                        }
                        ui.end_row();
                    }
                });
        });
}
