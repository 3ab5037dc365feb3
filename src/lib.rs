//! # SensorVis-RS: Safety Monitoring Dashboard
//!
//! A dashboard for geotechnical monitoring devices. Each device owns a set of
//! instruments (tilt sensors, secondary two-channel gauges) whose readings
//! are stored in MySQL as wide rows. The dashboard selects a device, loads its
//! readings, reshapes them into named series and charts them with a stable
//! marker symbol per series.
//!
//! ## Architecture
//!
//! - **Config**: Settings file plus connection resolution (secret store, then environment)
//! - **Backend**: The [`backend::ReadingStore`] seam, its MySQL implementation and a TTL query cache
//! - **Pipeline**: Reshaping, marker assignment and the per-request [`pipeline::Pipeline`] run
//! - **Frontend**: The eframe/egui dashboard with egui_plot charts
//!
//! ## Configuration
//!
//! Settings are read from the platform config directory under `sensorvis-rs`.
//! Database credentials come from `secrets.toml` (see [`config::secrets`]) or
//! the `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME` variables.
//!
//! ## Example
//!
//! ```ignore
//! use sensorvis_rs::{
//!     backend::{MySqlStore, SystemClock},
//!     config::{AppConfig, ConfigResolver},
//!     pipeline::{Pipeline, RenderRequest},
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_or_default();
//! let store = MySqlStore::new()?;
//! let pipeline = Pipeline::from_config(&config, ConfigResolver::default(), store, Arc::new(SystemClock));
//!
//! let run = pipeline.run(&RenderRequest::device("a1b2c3"));
//! for panel in &run.panels {
//!     println!("{}: {} rows", panel.schema.title, panel.rows.len());
//! }
//! ```

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use app::DashboardApp;
pub use backend::{CachedStore, MySqlStore, ReadingStore};
pub use config::{AppConfig, ConfigResolver, ConnectionDescriptor};
pub use error::{Result, SensorVisError};
pub use pipeline::{DashboardRun, Pipeline, RenderRequest};
pub use types::{DeviceRecord, InstrumentSchema, RawReading, SeriesPoint};
