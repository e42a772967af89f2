//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use dataflux_types::Settings;

/// Configuration for one scheduler instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Key namespace in the shared store.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Loop tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Concurrent dispatch ceiling. `None` means unbounded.
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Distributed lock TTL in seconds. Crash recovery only; independent
    /// of any job's timeout.
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u64,

    /// Retention window for history records, in seconds.
    #[serde(default = "default_history_retention_seconds")]
    pub history_retention_seconds: u64,

    /// Upper bound of the random delay applied before each dispatch.
    /// `0` disables jitter.
    #[serde(default)]
    pub max_dispatch_jitter_ms: u64,
}

fn default_namespace() -> String {
    "dataflux".to_string()
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

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent: None,
            lock_ttl_seconds: default_lock_ttl_seconds(),
            history_retention_seconds: default_history_retention_seconds(),
            max_dispatch_jitter_ms: 0,
        }
    }
}

impl SchedulerConfig {
    /// Derive the scheduler's slice of the daemon settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            tick_interval_ms: settings.tick_interval_ms,
            max_concurrent: settings.max_concurrent,
            lock_ttl_seconds: settings.lock_ttl_seconds,
            history_retention_seconds: settings.history_retention_seconds,
            max_dispatch_jitter_ms: settings.max_dispatch_jitter_ms,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn history_retention(&self) -> Duration {
        Duration::from_secs(self.history_retention_seconds)
    }
}
