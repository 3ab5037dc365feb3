//! Core data types for SensorVis-RS
//!
//! This module contains the fundamental data structures shared by the data
//! access layer, the series reshaper and the dashboard.
//!
//! # Main Types
//!
//! - [`DeviceRecord`] - One physical device from the `devices` table
//! - [`InstrumentSchema`] - Declaration of one instrument kind (table, channels, key template)
//! - [`RawReading`] - One wide-format row: timestamp, instrument and one value per channel
//! - [`SeriesPoint`] - One long-format point keyed by instrument + channel
//!
//! # Instrument kinds
//!
//! Instrument kinds are data, not code. The two built-in kinds are
//! [`InstrumentSchema::tilt`] (`x_value`/`y_value` → `X`/`Y`) and
//! [`InstrumentSchema::secondary`] (`value1`/`value2` → `VALUE1`/`VALUE2`);
//! further kinds can be declared in `settings.toml`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Placeholder for the uppercased instrument name in a key template
pub const INSTRUMENT_PLACEHOLDER: &str = "{instrument}";

/// Placeholder for the uppercased channel tag in a key template
pub const CHANNEL_PLACEHOLDER: &str = "{channel}";

/// Default series key template, e.g. `TI1_X`
pub const DEFAULT_KEY_TEMPLATE: &str = "{instrument}_{channel}";

/// A physical device as listed in the device catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Join key into the reading tables
    pub id: i64,
    /// User-facing identifier shown in the device selector
    pub uuid: String,
    /// Ordered channel identifiers (instrument numbers) attached to this device
    pub sensor_channels: Vec<String>,
}

impl DeviceRecord {
    pub fn new(id: i64, uuid: impl Into<String>, sensor_channels: Vec<String>) -> Self {
        Self {
            id,
            uuid: uuid.into(),
            sensor_channels,
        }
    }

    /// Parse the `sensorChannelList` column.
    ///
    /// Accepts a JSON array (`["1","2"]` or `[1,2]`) or a comma separated list
    /// (`1, 2`). Blank entries are skipped; `NULL` and empty strings give an
    /// empty list.
    pub fn parse_channel_list(raw: Option<&str>) -> Vec<String> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Vec::new();
        };

        if raw.starts_with('[') {
            if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) {
                return values
                    .into_iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }

        raw.trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .map(|s| s.trim().trim_matches('"').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// How a failed fetch of an instrument kind is reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Show an error notice and continue with an empty dataset
    #[default]
    Notify,
    /// Log only and continue with an empty dataset
    Silent,
}

/// One value column of an instrument kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Column name in the reading table
    pub column: String,
    /// Channel tag used in the series key (uppercased when the key is built)
    pub tag: String,
}

impl ChannelSpec {
    pub fn new(column: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            tag: tag.into(),
        }
    }
}

/// Declaration of one instrument kind
///
/// Everything the data access layer needs to build the query and everything
/// the reshaper needs to derive series keys lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSchema {
    /// Stable identifier, used in cache keys (e.g. `tilt`)
    pub name: String,
    /// Heading shown above the panel
    pub title: String,
    /// Reading table
    pub table: String,
    /// Column holding the device id
    #[serde(default = "default_device_column")]
    pub device_column: String,
    /// Column holding the reading timestamp
    #[serde(default = "default_time_column")]
    pub time_column: String,
    /// Column holding the instrument name
    #[serde(default = "default_name_column")]
    pub name_column: String,
    /// Value columns in declared order
    pub channels: Vec<ChannelSpec>,
    /// Series key template with `{instrument}` and `{channel}` placeholders
    #[serde(default = "default_key_template")]
    pub key_template: String,
    /// How fetch failures are reported
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

fn default_device_column() -> String {
    "device_id".to_string()
}

fn default_time_column() -> String {
    "DataTime".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

fn default_key_template() -> String {
    DEFAULT_KEY_TEMPLATE.to_string()
}

impl InstrumentSchema {
    /// Tilt sensors: one X/Y pair per reading
    pub fn tilt() -> Self {
        Self {
            name: "tilt".to_string(),
            title: "Tilt sensors".to_string(),
            table: "tis".to_string(),
            device_column: default_device_column(),
            time_column: default_time_column(),
            name_column: default_name_column(),
            channels: vec![
                ChannelSpec::new("x_value", "x"),
                ChannelSpec::new("y_value", "y"),
            ],
            key_template: default_key_template(),
            on_error: ErrorPolicy::Notify,
        }
    }

    /// Secondary instruments: one value1/value2 pair per reading
    ///
    /// Failures are silent since many devices carry no secondary instrument.
    pub fn secondary() -> Self {
        Self {
            name: "secondary".to_string(),
            title: "Secondary instruments".to_string(),
            table: "vgs".to_string(),
            device_column: default_device_column(),
            time_column: default_time_column(),
            name_column: default_name_column(),
            channels: vec![
                ChannelSpec::new("value1", "value1"),
                ChannelSpec::new("value2", "value2"),
            ],
            key_template: default_key_template(),
            on_error: ErrorPolicy::Silent,
        }
    }

    /// Build the series key for an instrument label and channel
    pub fn series_key(&self, instrument: &str, channel: &ChannelSpec) -> String {
        self.key_template
            .replace(INSTRUMENT_PLACEHOLDER, &instrument.to_uppercase())
            .replace(CHANNEL_PLACEHOLDER, &channel.tag.to_uppercase())
    }

    /// Column headers of the tabular view, in query order
    pub fn table_headers(&self) -> Vec<&str> {
        let mut headers = vec![self.time_column.as_str(), self.name_column.as_str()];
        headers.extend(self.channels.iter().map(|c| c.column.as_str()));
        headers
    }

    /// Number of declared value channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// One wide-format reading row
///
/// `values` is aligned with the channel list of the schema the row was fetched
/// with. SQL `NULL` is carried as `NaN` so that charts show a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub values: Vec<f64>,
}

impl RawReading {
    pub fn new(timestamp: NaiveDateTime, instrument: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            timestamp,
            instrument: instrument.into(),
            values,
        }
    }

    /// Tilt row with its X and Y values
    pub fn tilt(timestamp: NaiveDateTime, instrument: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(timestamp, instrument, vec![x, y])
    }

    /// Secondary row with its value1 and value2
    pub fn secondary(
        timestamp: NaiveDateTime,
        instrument: impl Into<String>,
        value1: f64,
        value2: f64,
    ) -> Self {
        Self::new(timestamp, instrument, vec![value1, value2])
    }

    /// Value of the given channel index; `NaN` when the row is short
    pub fn value(&self, channel: usize) -> f64 {
        self.values.get(channel).copied().unwrap_or(f64::NAN)
    }
}

/// One long-format point: a single value of a single series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub series_key: String,
    pub value: f64,
}
