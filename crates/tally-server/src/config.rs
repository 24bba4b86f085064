//! Configuration loading and typed config structures for the Tally server.
//!
//! The configuration lives in `tally.yaml` (path overridable with
//! `TALLY_CONFIG`). Every section and field has a default, so a missing
//! file or a partial file is valid. Environment variables are applied on
//! top of whatever the file provides:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `SERVER_ADDR` | `server.host` and `server.port` (`host:port` or `:port`) |
//! | `DRAGONFLY_URL` | `store.dragonfly_url` |
//! | `LOG_LEVEL` | `logging.level` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tally_store::DragonflyOptions;

/// Config file read when `TALLY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "tally.yaml";

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "TALLY_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override holds an unusable value.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// The offending variable.
        var: &'static str,
        /// Its value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration. Mirrors the structure of `tally.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TallyConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Poll store backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Request handling settings.
    #[serde(default)]
    pub api: ApiConfig,
}

impl TallyConfig {
    /// Load configuration from `TALLY_CONFIG` or `tally.yaml`, then apply
    /// environment overrides. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or if an environment override is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values (see module docs).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `SERVER_ADDR` is malformed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `SERVER_ADDR` is malformed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("SERVER_ADDR") {
            self.server.apply_addr(&addr)?;
        }
        if let Some(url) = lookup("DRAGONFLY_URL") {
            self.store.dragonfly_url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply a `host:port` or `:port` override. An empty host keeps the
    /// configured one.
    fn apply_addr(&mut self, addr: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidEnv {
            var: "SERVER_ADDR",
            value: addr.to_owned(),
        };
        let (host, port) = addr.trim().rsplit_once(':').ok_or_else(invalid)?;
        self.port = port.parse::<u16>().ok().ok_or_else(invalid)?;
        if !host.is_empty() {
            host.clone_into(&mut self.host);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which store backend holds poll records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `Dragonfly` (Redis-compatible) server.
    #[default]
    Dragonfly,
    /// Process-local map. Data is lost on restart.
    Memory,
}

/// Poll store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,

    /// `Dragonfly` connection URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay between reconnection attempts in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Reconnection attempts before giving up.
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
}

impl StoreConfig {
    /// Connection options for the `Dragonfly` backend.
    pub fn dragonfly_options(&self) -> DragonflyOptions {
        DragonflyOptions {
            url: self.dragonfly_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnects: self.max_reconnects,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnects: default_max_reconnects(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Request handling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// How many times a mutation is re-run after a write conflict.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_reconnect_delay_ms() -> u64 {
    1_000
}

const fn default_max_reconnects() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_conflict_retries() -> u32 {
    3
}
