//! Configuration loading for the DataFlux daemon.
//!
//! Layered precedence: built-in defaults -> config file
//! (~/.config/dataflux/config.toml) -> CLI-specified file -> environment
//! variables (DATAFLUX_*). CLI flags are applied by the caller last.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::DatafluxError;

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Connection URL of the shared store.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key namespace prefix for everything the scheduler persists.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Scheduler loop tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Concurrent dispatch ceiling. `None` means unbounded.
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Distributed lock TTL in seconds; crash recovery only.
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u64,

    /// Retention window for history records, in seconds.
    #[serde(default = "default_history_retention_seconds")]
    pub history_retention_seconds: u64,

    /// Upper bound of the random delay applied before each dispatch.
    #[serde(default)]
    pub max_dispatch_jitter_ms: u64,

    /// Permit falling back to the in-process store when the shared store is
    /// unreachable at startup. Safe only when a single scheduler instance
    /// runs; distributed locking does not apply.
    #[serde(default)]
    pub allow_degraded: bool,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_namespace() -> String {
    "dataflux".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_lock_ttl_seconds() -> u64 {
    3600
}

fn default_history_retention_seconds() -> u64 {
    30 * 24 * 3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            namespace: default_namespace(),
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent: None,
            lock_ttl_seconds: default_lock_ttl_seconds(),
            history_retention_seconds: default_history_retention_seconds(),
            max_dispatch_jitter_ms: 0,
            allow_degraded: false,
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/dataflux/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DATAFLUX_REDIS_URL, DATAFLUX_NAMESPACE, ...)
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, DatafluxError> {
        let config_dir = ProjectDirs::from("", "", "dataflux")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("redis_url", default_redis_url())
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("namespace", default_namespace())
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("tick_interval_ms", default_tick_interval_ms() as i64)
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("lock_ttl_seconds", default_lock_ttl_seconds() as i64)
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default(
                "history_retention_seconds",
                default_history_retention_seconds() as i64,
            )
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("max_dispatch_jitter_ms", 0i64)
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .set_default("allow_degraded", false)
            .map_err(|e| DatafluxError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Flat keys, so no separator: DATAFLUX_REDIS_URL -> redis_url.
        builder = builder.add_source(Environment::with_prefix("DATAFLUX").try_parsing(true));

        let config = builder
            .build()
            .map_err(|e| DatafluxError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| DatafluxError::Config(e.to_string()))
    }

    /// Validate value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), DatafluxError> {
        if self.namespace.is_empty() {
            return Err(DatafluxError::Config("namespace must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(DatafluxError::Config(
                "tick_interval_ms must be > 0".into(),
            ));
        }
        if self.lock_ttl_seconds == 0 {
            return Err(DatafluxError::Config(
                "lock_ttl_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}
