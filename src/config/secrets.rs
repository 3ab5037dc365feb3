//! Connection descriptor resolution
//!
//! The descriptor comes from one of two prioritized sources:
//!
//! 1. A TOML secret store with a `[mysql]` table:
//!
//! ```toml
//! [mysql]
//! host = "db.example.com"
//! user = "monitor"
//! password = "..."
//! database = "monitoring"
//! ```
//!
//! 2. The environment variables `DB_HOST`, `DB_USER`, `DB_PASSWORD` and
//!    `DB_NAME` (`DB_PORT` optional).
//!
//! Resolution is cheap and is repeated on every pipeline run so that edited
//! credentials take effect without a restart.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Secrets filename
pub const SECRETS_FILE: &str = "secrets.toml";

/// Project-local directory searched before the user config directory
pub const LOCAL_CONFIG_DIR: &str = ".sensorvis";

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// Default bound on opening a connection
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Everything needed to open a database connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl ConnectionDescriptor {
    /// Identity of the data source, used to separate cache entries
    pub fn source_id(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Source the descriptor was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    SecretStore,
    Environment,
}

/// `[mysql]` table of the secret store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MySqlSecrets {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

/// Parsed secret store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsFile {
    pub mysql: Option<MySqlSecrets>,
}

impl SecretsFile {
    /// Load a secret store from a path
    ///
    /// Returns `None` when the file is missing or unreadable; a malformed file
    /// is logged and treated as absent so the environment fallback applies.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(secrets) => {
                tracing::debug!("Loaded secret store from {:?}", path);
                Some(secrets)
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed secret store {:?}: {}", path, e);
                None
            }
        }
    }

    /// Load the first secret store found in the default search path
    pub fn discover() -> Option<Self> {
        default_secret_paths().iter().find_map(Self::load)
    }
}

/// Search path for the secret store, highest priority first
pub fn default_secret_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_DIR).join(SECRETS_FILE)];
    if let Some(dir) = super::app_config_dir() {
        paths.push(dir.join(SECRETS_FILE));
    }
    paths
}

/// Resolves connection descriptors from the secret store and the environment
///
/// The sources are injected so resolution can be tested without touching the
/// filesystem or the process environment.
pub struct ConfigResolver {
    secrets: Box<dyn Fn() -> Option<SecretsFile> + Send + Sync>,
    env: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    connect_timeout: Duration,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(
            SecretsFile::discover,
            |key| std::env::var(key).ok(),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}

impl ConfigResolver {
    pub fn new(
        secrets: impl Fn() -> Option<SecretsFile> + Send + Sync + 'static,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            secrets: Box::new(secrets),
            env: Box::new(env),
            connect_timeout,
        }
    }

    /// Replace the connect timeout applied to resolved descriptors
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve a descriptor, secret store first
    pub fn resolve(&self) -> Result<ConnectionDescriptor, ConfigError> {
        self.resolve_with_source().map(|(descriptor, _)| descriptor)
    }

    /// Resolve a descriptor and report which source supplied it
    pub fn resolve_with_source(
        &self,
    ) -> Result<(ConnectionDescriptor, CredentialSource), ConfigError> {
        if let Some(mysql) = (self.secrets)().and_then(|s| s.mysql) {
            if !mysql.host.trim().is_empty() {
                let descriptor = ConnectionDescriptor {
                    host: mysql.host.trim().to_string(),
                    port: mysql.port.unwrap_or(DEFAULT_PORT),
                    user: mysql.user,
                    password: mysql.password,
                    database: mysql.database,
                    connect_timeout: self.connect_timeout,
                };
                return Ok((descriptor, CredentialSource::SecretStore));
            }
            tracing::debug!("Secret store has no mysql host, falling back to environment");
        }

        let host = (self.env)("DB_HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        let port = match (self.env)("DB_PORT").filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "DB_PORT".to_string(),
                    message: e.to_string(),
                })?,
            None => DEFAULT_PORT,
        };

        let descriptor = ConnectionDescriptor {
            host,
            port,
            user: (self.env)("DB_USER").unwrap_or_default(),
            password: (self.env)("DB_PASSWORD").unwrap_or_default(),
            database: (self.env)("DB_NAME").unwrap_or_default(),
            connect_timeout: self.connect_timeout,
        };
        Ok((descriptor, CredentialSource::Environment))
    }
}
