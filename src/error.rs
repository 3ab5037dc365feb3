//! Error handling for the SensorVis-RS application
//!
//! This module defines the error taxonomy of the dashboard pipeline and a
//! Result alias for use throughout the application.
//!
//! - [`ConfigError`] - the connection descriptor could not be resolved
//! - [`DataAccessError`] - a database connection or query failed
//! - [`SensorVisError`] - umbrella error for everything else (settings files, IO)
//!
//! An empty result set is not an error: every fetch that succeeds with zero
//! rows returns an empty `Vec`.

use thiserror::Error;

/// Failure to produce a connection descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither the secret store nor the environment yields a non-empty host
    #[error("No database host configured (checked secrets.toml [mysql] and DB_HOST)")]
    MissingHost,

    /// A value was present but could not be interpreted
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure while talking to the reading store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataAccessError {
    /// The connection could not be opened (includes connect timeouts)
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was opened but the query failed
    #[error("Database query failed: {0}")]
    QueryFailed(String),
}

/// Main error type for SensorVis-RS operations
#[derive(Error, Debug)]
pub enum SensorVisError {
    /// Connection descriptor resolution errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading store errors
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// Errors related to settings files
    #[error("Settings error: {0}")]
    Settings(String),

    /// Instrument schema declarations that cannot be turned into queries
    #[error("Invalid instrument schema '{schema}': {message}")]
    Schema { schema: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SensorVisError>,
    },
}

impl SensorVisError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SensorVisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for SensorVis-RS operations
pub type Result<T> = std::result::Result<T, SensorVisError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SensorVisError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
