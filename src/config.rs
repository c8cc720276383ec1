//! Application configuration.
//!
//! YAML-based configuration for the web server, the telemetry listener and
//! the log store. Every section has working defaults so a bare config file
//! (or none at all) starts a usable instance.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capacity of the bounded ingest queue.
///
/// At 10k queued frames the listener can absorb roughly half an hour of
/// dashboard-rate telemetry before drops start, which is ample headroom for
/// a writer stalled on a slow SD card.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

// =============================================================================
// Sections
// =============================================================================

/// Web server (query API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "0.0.0.0").
    pub bind: String,
    /// Port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Telemetry listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Bind address (default: "0.0.0.0").
    pub bind: String,
    /// Port the field gateway connects to (default: 5000).
    pub port: u16,
    /// Bounded queue between the listener and the router thread.
    pub queue_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Log store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding day-partitioned log files and settings.json.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

// =============================================================================
// Top level
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, bind) in [("server", &self.server.bind), ("ingest", &self.ingest.bind)] {
            bind.parse::<IpAddr>().map_err(|_| {
                ConfigError::Validation(format!("invalid {label} bind address: '{bind}'"))
            })?;
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server port must be non-zero".to_string(),
            ));
        }
        if self.ingest.port == 0 {
            return Err(ConfigError::Validation(
                "ingest port must be non-zero".to_string(),
            ));
        }
        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "ingest queue_capacity must be positive".to_string(),
            ));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage data_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the persisted settings blob, kept beside the log files.
    pub fn settings_path(&self) -> PathBuf {
        self.storage.data_dir.join("settings.json")
    }
}
