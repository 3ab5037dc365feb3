//! Configuration module for SensorVis-RS
//!
//! This module handles:
//! - Dashboard settings (`settings.toml`): cache TTLs, connect timeout,
//!   date filtering, marker strategy and instrument schemas
//! - Connection descriptor resolution from the secret store or the
//!   environment (see [`secrets`])
//!
//! # Locations
//!
//! Settings and secrets live in the platform config directory under
//! `sensorvis-rs`:
//!
//! - **Linux**: `~/.config/sensorvis-rs/`
//! - **macOS**: `~/Library/Application Support/sensorvis-rs/`
//! - **Windows**: `%APPDATA%\sensorvis-rs\`
//!
//! A `.sensorvis/secrets.toml` in the working directory takes priority over
//! the one in the config directory. Log files are written to the platform
//! data directory.
//!
//! # Example
//!
//! ```toml
//! reading_ttl_secs = 60
//! connect_timeout_secs = 10
//! date_filter = "enabled"
//! marker_strategy = "cyclic"
//! default_device_id = 1
//! ```

pub mod secrets;

pub use secrets::{ConfigResolver, ConnectionDescriptor, CredentialSource, SecretsFile};

use crate::error::{Result, ResultExt, SensorVisError};
use crate::types::InstrumentSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config and data directories
pub const APP_ID: &str = "sensorvis-rs";

/// Settings filename
pub const SETTINGS_FILE: &str = "settings.toml";

/// Default lifetime of cached reading queries
pub const DEFAULT_READING_TTL_SECS: u64 = 60;

/// Device selected when the user has not picked one yet (if present)
pub const DEFAULT_DEVICE_ID: i64 = 1;

/// Get the application config directory path
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the application data directory path (log files)
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the settings file
pub fn settings_path() -> Option<PathBuf> {
    app_config_dir().map(|p| p.join(SETTINGS_FILE))
}

/// Whether the start-date filter is offered and applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFilterMode {
    /// Always fetch the full history; a requested start date is ignored
    Disabled,
    /// Fetch readings at or after the requested start date
    #[default]
    Enabled,
}

/// Which marker assignment strategy the dashboard uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStrategyKind {
    /// Lexicographic order, palette traversed cyclically
    #[default]
    Cyclic,
    /// Shuffled palette; reproducible only with `marker_seed`
    Random,
}

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lifetime of cached reading queries in seconds
    #[serde(default = "default_reading_ttl_secs")]
    pub reading_ttl_secs: u64,

    /// Lifetime of the cached device catalog; `None` keeps it for the whole run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_ttl_secs: Option<u64>,

    /// Bound on opening a database connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub date_filter: DateFilterMode,

    #[serde(default)]
    pub marker_strategy: MarkerStrategyKind,

    /// Seed for the random marker strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_seed: Option<u64>,

    /// Device preselected at startup when present in the catalog
    #[serde(default = "default_device_id")]
    pub default_device_id: Option<i64>,

    /// Instrument kinds shown on the dashboard, in display order
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentSchema>,
}

fn default_reading_ttl_secs() -> u64 {
    DEFAULT_READING_TTL_SECS
}

fn default_connect_timeout_secs() -> u64 {
    secrets::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_device_id() -> Option<i64> {
    Some(DEFAULT_DEVICE_ID)
}

fn default_instruments() -> Vec<InstrumentSchema> {
    vec![InstrumentSchema::tilt(), InstrumentSchema::secondary()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reading_ttl_secs: default_reading_ttl_secs(),
            catalog_ttl_secs: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            date_filter: DateFilterMode::default(),
            marker_strategy: MarkerStrategyKind::default(),
            marker_seed: None,
            default_device_id: default_device_id(),
            instruments: default_instruments(),
        }
    }
}

impl AppConfig {
    /// Load settings from a path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid settings in {:?}", path))
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SensorVisError::Settings(format!("Failed to parse settings: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save settings to a path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SensorVisError::Serialization(e.to_string()))?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
    }

    /// Reject settings that cannot produce valid queries
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(SensorVisError::Settings(
                "at least one instrument must be declared".to_string(),
            ));
        }
        for schema in &self.instruments {
            crate::backend::validate_schema(schema)?;
        }
        let mut names: Vec<&str> = self.instruments.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(SensorVisError::Settings(
                "instrument names must be unique".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reading_ttl(&self) -> Duration {
        Duration::from_secs(self.reading_ttl_secs)
    }

    pub fn catalog_ttl(&self) -> Option<Duration> {
        self.catalog_ttl_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
