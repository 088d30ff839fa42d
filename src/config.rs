use crate::core::{Result, TxsqlError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Option key naming the SQLite database file (or `:memory:`).
pub const OPT_DATABASE: &str = "database";
/// Option key for the statement busy timeout, in milliseconds.
pub const OPT_BUSY_TIMEOUT_MS: &str = "busy_timeout_ms";
/// Option key toggling foreign key enforcement (`on`/`off`).
pub const OPT_FOREIGN_KEYS: &str = "foreign_keys";

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub batch: Option<BatchSettings>,
}

/// Connection parameters. Immutable once handed to a connection manager.
#[derive(Clone, Deserialize, PartialEq, Default)]
pub struct ConnectionConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Engine-specific options (database name, timeouts, pragmas)
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Batch-related configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BatchSettings {
    pub chunk_size: Option<usize>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        ConnectionConfig {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            options: BTreeMap::new(),
        }
    }

    /// Config for a private in-memory SQLite database.
    pub fn in_memory() -> Self {
        Self::new("localhost", "", "").with_option(OPT_DATABASE, ":memory:")
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn database(&self) -> &str {
        self.option(OPT_DATABASE).unwrap_or(":memory:")
    }

    /// Statement timeout passed through to the connection at open time.
    pub fn busy_timeout(&self) -> Result<Option<Duration>> {
        match self.option(OPT_BUSY_TIMEOUT_MS) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(|ms| Some(Duration::from_millis(ms)))
                .map_err(|e| TxsqlError::Config(format!("invalid {}: '{}' ({})", OPT_BUSY_TIMEOUT_MS, raw, e))),
        }
    }

    pub fn foreign_keys(&self) -> Result<Option<bool>> {
        match self.option(OPT_FOREIGN_KEYS).map(|v| v.trim().to_lowercase()) {
            None => Ok(None),
            Some(v) if matches!(v.as_str(), "on" | "true" | "1") => Ok(Some(true)),
            Some(v) if matches!(v.as_str(), "off" | "false" | "0") => Ok(Some(false)),
            Some(v) => Err(TxsqlError::Config(format!("invalid {}: '{}'", OPT_FOREIGN_KEYS, v))),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("options", &self.options)
            .finish()
    }
}

impl BatchSettings {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Config> {
        toml::from_str(content).map_err(|e| TxsqlError::Config(e.to_string()))
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = txsql::config::load_config("txsql.toml").expect("Failed to load config");
/// println!("{:?}", config.connection);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
