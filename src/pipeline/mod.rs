//! Dashboard pipeline
//!
//! One synchronous pass per user interaction:
//!
//! ```text
//! ConfigResolver → CachedStore (catalog) → CachedStore (readings per schema)
//!                → reshape → MarkerStrategy → DashboardRun
//! ```
//!
//! No stage is fatal. Configuration and catalog failures produce an error
//! [`Notice`] and halt the run with an empty result. Reading failures degrade
//! to an empty dataset for that instrument; whether the user is told depends
//! on the schema's [`ErrorPolicy`].
//!
//! # Main Types
//!
//! - [`Pipeline`] - The configured pipeline (resolver, cached store, marker strategy)
//! - [`RenderRequest`] - Device selection and optional start date
//! - [`DashboardRun`] - Everything the presentation layer needs for one render
//! - [`DeviceCatalog`] - The device list, fetched once per run

pub mod markers;
pub mod reshape;

pub use markers::{
    assign, CyclicMarkers, MarkerStrategy, MarkerSymbol, RandomMarkers, SymbolAssignment, PALETTE,
};
pub use reshape::{group_series, reshape, series_keys, Series};

use crate::backend::{CachedStore, Clock, ReadingStore, Ttl};
use crate::config::{AppConfig, ConfigResolver, DateFilterMode, MarkerStrategyKind};
use crate::types::{DeviceRecord, ErrorPolicy, InstrumentSchema, RawReading, SeriesPoint};
use chrono::NaiveDate;
use std::sync::Arc;

/// Severity of a user-visible message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user; never a crash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The device list
///
/// Fetched once and shared; the id, uuid and channel projections are all
/// derived from the same in-memory list.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Arc<Vec<DeviceRecord>>,
}

impl DeviceCatalog {
    pub fn new(devices: Arc<Vec<DeviceRecord>>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.devices.iter().map(|d| d.id).collect()
    }

    pub fn uuids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.uuid.as_str()).collect()
    }

    pub fn sensor_channels(&self) -> Vec<&[String]> {
        self.devices.iter().map(|d| d.sensor_channels.as_slice()).collect()
    }

    pub fn by_uuid(&self, uuid: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.uuid == uuid)
    }

    pub fn by_id(&self, id: i64) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// The preferred device if listed, otherwise the first one
    pub fn default_device(&self, preferred_id: Option<i64>) -> Option<&DeviceRecord> {
        preferred_id
            .and_then(|id| self.by_id(id))
            .or_else(|| self.devices.first())
    }
}

/// What the user asked to see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    /// Device uuid; `None` selects the default device
    pub device_uuid: Option<String>,
    /// Lower bound on reading timestamps (inclusive, from midnight)
    pub start_date: Option<NaiveDate>,
}

impl RenderRequest {
    pub fn device(uuid: impl Into<String>) -> Self {
        Self {
            device_uuid: Some(uuid.into()),
            start_date: None,
        }
    }

    pub fn since(mut self, start: NaiveDate) -> Self {
        self.start_date = Some(start);
        self
    }
}

/// Why a run stopped before fetching readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// No connection descriptor could be resolved
    Configuration,
    /// The device catalog query failed
    CatalogUnavailable,
    /// The device catalog is empty
    NoDevices,
}

/// Data of one instrument kind for the selected device
#[derive(Debug, Clone)]
pub struct InstrumentPanel {
    pub schema: InstrumentSchema,
    /// Wide rows for the table, newest first
    pub rows: Arc<Vec<RawReading>>,
    /// Long-format points
    pub points: Vec<SeriesPoint>,
    /// Points grouped per series, ascending in time
    pub series: Vec<Series>,
    /// Whether the fetch failed (the panel is then empty)
    pub failed: bool,
}

impl InstrumentPanel {
    fn new(schema: &InstrumentSchema, rows: Arc<Vec<RawReading>>, failed: bool) -> Self {
        let points = reshape(&rows, schema);
        let series = group_series(&points);
        Self {
            schema: schema.clone(),
            rows,
            points,
            series,
            failed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of one pipeline pass
#[derive(Debug, Clone, Default)]
pub struct DashboardRun {
    pub catalog: DeviceCatalog,
    pub device: Option<DeviceRecord>,
    /// Start date actually applied to the queries
    pub start_date: Option<NaiveDate>,
    pub panels: Vec<InstrumentPanel>,
    /// One assignment across every panel of this run
    pub symbols: SymbolAssignment,
    pub notices: Vec<Notice>,
    pub halted: Option<Halt>,
}

impl DashboardRun {
    fn halt(halt: Halt, catalog: DeviceCatalog, notices: Vec<Notice>) -> Self {
        Self {
            catalog,
            notices,
            halted: Some(halt),
            ..Default::default()
        }
    }

    pub fn panel(&self, schema_name: &str) -> Option<&InstrumentPanel> {
        self.panels.iter().find(|p| p.schema.name == schema_name)
    }
}

/// Pipeline options that are not part of the store or resolver
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub date_filter: DateFilterMode,
    pub default_device_id: Option<i64>,
    pub instruments: Vec<InstrumentSchema>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            date_filter: config.date_filter,
            default_device_id: config.default_device_id,
            instruments: config.instruments,
        }
    }
}

/// The configured dashboard pipeline
pub struct Pipeline<S> {
    resolver: ConfigResolver,
    store: CachedStore<S>,
    markers: Box<dyn MarkerStrategy>,
    options: PipelineOptions,
}

impl<S: ReadingStore> Pipeline<S> {
    pub fn new(
        resolver: ConfigResolver,
        store: CachedStore<S>,
        markers: Box<dyn MarkerStrategy>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            store,
            markers,
            options,
        }
    }

    /// Build a pipeline from dashboard settings
    pub fn from_config(
        config: &AppConfig,
        resolver: ConfigResolver,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let markers: Box<dyn MarkerStrategy> = match config.marker_strategy {
            MarkerStrategyKind::Cyclic => Box::new(CyclicMarkers),
            MarkerStrategyKind::Random => Box::new(RandomMarkers::new(config.marker_seed)),
        };
        let store = CachedStore::new(
            store,
            clock,
            Ttl::from(config.catalog_ttl()),
            Ttl::After(config.reading_ttl()),
        );
        let options = PipelineOptions {
            date_filter: config.date_filter,
            default_device_id: config.default_device_id,
            instruments: config.instruments.clone(),
        };
        Self::new(
            resolver.with_connect_timeout(config.connect_timeout()),
            store,
            markers,
            options,
        )
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &CachedStore<S> {
        &self.store
    }

    /// Forget every cached result so the next run hits the database
    pub fn refresh(&self) {
        tracing::info!("Clearing query cache");
        self.store.clear();
    }

    /// Run one pass for the given request
    pub fn run(&self, request: &RenderRequest) -> DashboardRun {
        let mut notices = Vec::new();

        let purged = self.store.purge_expired();
        if purged > 0 {
            tracing::debug!("Evicted {} expired cache entries", purged);
        }

        let conn = match self.resolver.resolve() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Connection descriptor unavailable: {}", e);
                notices.push(Notice::error(e.to_string()));
                return DashboardRun::halt(Halt::Configuration, DeviceCatalog::default(), notices);
            }
        };

        let catalog = match self.store.device_catalog(&conn) {
            Ok(devices) => DeviceCatalog::new(devices),
            Err(e) => {
                tracing::warn!("Device catalog unavailable: {}", e);
                notices.push(Notice::error(format!("Unable to load device list: {}", e)));
                return DashboardRun::halt(
                    Halt::CatalogUnavailable,
                    DeviceCatalog::default(),
                    notices,
                );
            }
        };

        if catalog.is_empty() {
            tracing::info!("Device catalog is empty");
            notices.push(Notice::info("No devices found"));
            return DashboardRun::halt(Halt::NoDevices, catalog, notices);
        }

        let requested = request
            .device_uuid
            .as_deref()
            .and_then(|uuid| catalog.by_uuid(uuid));
        if let (Some(uuid), None) = (request.device_uuid.as_deref(), requested) {
            notices.push(Notice::warning(format!(
                "Device {} is no longer listed, showing the default device",
                uuid
            )));
        }
        let device = match requested.or_else(|| catalog.default_device(self.options.default_device_id)) {
            Some(device) => device.clone(),
            None => return DashboardRun::halt(Halt::NoDevices, catalog, notices),
        };

        let start_date = match self.options.date_filter {
            DateFilterMode::Enabled => request.start_date,
            DateFilterMode::Disabled => None,
        };

        tracing::info!(
            device_id = device.id,
            uuid = %device.uuid,
            ?start_date,
            "Running dashboard pipeline"
        );

        let panels: Vec<InstrumentPanel> = self
            .options
            .instruments
            .iter()
            .map(|schema| self.load_panel(&conn, schema, &device, start_date, &mut notices))
            .collect();

        let keys: Vec<String> = panels
            .iter()
            .flat_map(|panel| panel.series.iter().map(|s| s.key.clone()))
            .collect();
        let symbols = self.markers.assign(&keys);
        if symbols.has_collisions() {
            tracing::debug!(
                "{} series share {} marker symbols",
                symbols.len(),
                PALETTE.len()
            );
        }

        DashboardRun {
            catalog,
            device: Some(device),
            start_date,
            panels,
            symbols,
            notices,
            halted: None,
        }
    }

    fn load_panel(
        &self,
        conn: &crate::config::ConnectionDescriptor,
        schema: &InstrumentSchema,
        device: &DeviceRecord,
        start: Option<NaiveDate>,
        notices: &mut Vec<Notice>,
    ) -> InstrumentPanel {
        match self.store.readings(conn, schema, device.id, start) {
            Ok(rows) => {
                if rows.is_empty() && schema.on_error == ErrorPolicy::Notify {
                    notices.push(Notice::info(format!(
                        "No {} data found for device {}",
                        schema.title.to_lowercase(),
                        device.uuid
                    )));
                }
                InstrumentPanel::new(schema, rows, false)
            }
            Err(e) => {
                match schema.on_error {
                    ErrorPolicy::Notify => {
                        tracing::warn!(schema = %schema.name, "Reading fetch failed: {}", e);
                        notices.push(Notice::error(format!(
                            "Unable to load {} for device {}: {}",
                            schema.title.to_lowercase(),
                            device.uuid,
                            e
                        )));
                    }
                    ErrorPolicy::Silent => {
                        tracing::debug!(schema = %schema.name, "Reading fetch failed silently: {}", e);
                    }
                }
                InstrumentPanel::new(schema, Arc::new(Vec::new()), true)
            }
        }
    }
}
