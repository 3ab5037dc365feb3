//! Frontend module for egui UI
//!
//! The dashboard is a single window: a sidebar with the device selector,
//! start-date filter and refresh button, and a central area with one panel
//! per instrument kind (table, chart, row count).
//!
//! Every interaction that changes the request runs the pipeline once,
//! synchronously, on the UI thread. Cached queries make repeated renders
//! cheap; the refresh button drops the cache.
//!
//! # Submodules
//!
//! - `plot` - Chart rendering with egui_plot and marker shapes
//! - `table` - Tabular view of the wide rows

mod plot;
mod table;

pub use plot::{format_time_axis, marker_shape, render_panel_chart, series_color, ChartStyle};
pub use table::{format_value, render_readings_table, TIMESTAMP_FORMAT};

use crate::backend::ReadingStore;
use crate::config::DateFilterMode;
use crate::pipeline::{DashboardRun, Halt, Notice, NoticeLevel, Pipeline, RenderRequest};
use chrono::NaiveDate;
use egui::{Color32, RichText};

/// Date format accepted by the start-date field
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Parse the start-date field; blank means "no filter"
pub fn parse_start_date(input: &str) -> Result<Option<NaiveDate>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, DATE_INPUT_FORMAT)
        .map(Some)
        .map_err(|_| format!("Expected a date like 2025-08-07, got '{}'", input))
}

fn notice_color(level: NoticeLevel) -> Color32 {
    match level {
        NoticeLevel::Info => Color32::LIGHT_BLUE,
        NoticeLevel::Warning => Color32::YELLOW,
        NoticeLevel::Error => Color32::from_rgb(255, 99, 71),
    }
}

/// Main application state
pub struct DashboardApp<S> {
    pipeline: Pipeline<S>,
    request: RenderRequest,
    run: DashboardRun,
    needs_run: bool,
    date_filter_on: bool,
    date_input: String,
    date_error: Option<String>,
    chart_style: ChartStyle,
}

impl<S: ReadingStore> DashboardApp<S> {
    pub fn new(pipeline: Pipeline<S>) -> Self {
        Self {
            pipeline,
            request: RenderRequest::default(),
            run: DashboardRun::default(),
            needs_run: true,
            date_filter_on: false,
            date_input: String::new(),
            date_error: None,
            chart_style: ChartStyle::default(),
        }
    }

    fn execute(&mut self) {
        self.run = self.pipeline.run(&self.request);
        if let Some(device) = &self.run.device {
            self.request.device_uuid = Some(device.uuid.clone());
        }
        self.needs_run = false;
    }

    fn show_sidebar(&mut self, ui: &mut egui::Ui) {
        ui.heading("Data filters");
        ui.add_space(8.0);

        let catalog = self.run.catalog.clone();
        let selected = self.request.device_uuid.clone().unwrap_or_default();
        let mut choice = selected.clone();
        ui.label("Device (uuid):");
        ui.add_enabled_ui(!catalog.is_empty(), |ui| {
            egui::ComboBox::from_id_salt("device_selector")
                .selected_text(if choice.is_empty() { "—" } else { choice.as_str() })
                .show_ui(ui, |ui| {
                    for device in catalog.devices() {
                        ui.selectable_value(&mut choice, device.uuid.clone(), &device.uuid);
                    }
                });
        });
        if choice != selected {
            tracing::debug!("Device selection changed to {}", choice);
            self.request.device_uuid = Some(choice);
            self.needs_run = true;
        }

        if self.pipeline.options().date_filter == DateFilterMode::Enabled {
            ui.add_space(8.0);
            if ui
                .checkbox(&mut self.date_filter_on, "Only readings since")
                .changed()
            {
                self.apply_date_input();
            }
            ui.add_enabled_ui(self.date_filter_on, |ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.date_input).hint_text("YYYY-MM-DD"),
                );
                if response.lost_focus() {
                    self.apply_date_input();
                }
            });
            if let Some(error) = &self.date_error {
                ui.colored_label(notice_color(NoticeLevel::Error), error);
            }
        }

        ui.add_space(8.0);
        if ui.button("⟳ Refresh").clicked() {
            self.pipeline.refresh();
            self.needs_run = true;
        }

        ui.add_space(8.0);
        ui.checkbox(&mut self.chart_style.show_legend, "Show legend");

        let stats = self.pipeline.store().stats();
        ui.separator();
        ui.label(
            RichText::new(format!(
                "Cache: {} entries, {} hits, {} misses",
                stats.entries, stats.hits, stats.misses
            ))
            .small()
            .weak(),
        );
    }

    fn apply_date_input(&mut self) {
        let start = if self.date_filter_on {
            match parse_start_date(&self.date_input) {
                Ok(start) => {
                    self.date_error = None;
                    start
                }
                Err(e) => {
                    self.date_error = Some(e);
                    return;
                }
            }
        } else {
            self.date_error = None;
            None
        };

        if start != self.request.start_date {
            self.request.start_date = start;
            self.needs_run = true;
        }
    }

    fn show_notices(ui: &mut egui::Ui, notices: &[Notice]) {
        for notice in notices {
            ui.colored_label(notice_color(notice.level), &notice.message);
        }
    }

    fn show_run(&self, ui: &mut egui::Ui) {
        let run = &self.run;
        Self::show_notices(ui, &run.notices);

        if let Some(halt) = run.halted {
            ui.add_space(16.0);
            let text = match halt {
                Halt::Configuration => "Database connection is not configured.",
                Halt::CatalogUnavailable => "The device list could not be loaded.",
                Halt::NoDevices => "No devices to display.",
            };
            ui.label(RichText::new(text).weak());
            return;
        }

        let Some(device) = &run.device else {
            return;
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            for panel in &run.panels {
                if panel.is_empty() {
                    continue;
                }
                ui.add_space(12.0);
                ui.heading(format!("Device {}: {}", device.uuid, panel.schema.title));

                ui.label(RichText::new("Data table").strong());
                render_readings_table(ui, &panel.schema, &panel.rows, 240.0);

                ui.add_space(8.0);
                ui.label(RichText::new("Trend").strong());
                render_panel_chart(ui, panel, &run.symbols, &self.chart_style);

                ui.colored_label(
                    notice_color(NoticeLevel::Info),
                    format!("{} readings loaded.", panel.rows.len()),
                );
                ui.separator();
            }
        });
    }
}

impl<S: ReadingStore> eframe::App for DashboardApp<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.needs_run {
            self.execute();
        }

        egui::TopBottomPanel::top("title_bar").show(ctx, |ui| {
            ui.heading("Safety Monitoring Dashboard");
        });

        egui::SidePanel::left("filters")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| self.show_sidebar(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.show_run(ui));

        if self.needs_run {
            ctx.request_repaint();
        }
    }
}
