//! Job definition types.
//!
//! A job is split into its serializable definition (`JobSpec`), the mutable
//! runtime fields owned by the registry (`JobState`), and a partial update
//! (`JobConfigUpdate`) applied through the scheduler's control surface. The
//! work unit itself is a closure and lives in the registry, not here.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relative importance of a job. Informational only: it does not affect
/// scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Static definition of a scheduled job.
///
/// Created once at registration; the schedule expression is re-parsed every
/// time the next fire time must be derived, so the string here is the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique identifier, also the lock and result key component.
    pub job_id: String,
    /// Human-readable name for logging and status output.
    pub name: String,
    /// Recurrence expression, e.g. `"every 5 minutes"` or `"daily at 02:00"`.
    pub schedule_expression: String,
    #[serde(default)]
    pub priority: JobPriority,
    /// Execution ceiling in seconds. `0` disables the ceiling.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Maximum retry attempts per failure chain.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before a deferred re-attempt after a failure.
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    /// Descriptive labels; not interpreted by the scheduler.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Job ids whose latest result must be completed before this job runs.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

fn default_timeout_seconds() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

impl JobSpec {
    /// Create a spec with the given identity and schedule, defaults elsewhere.
    pub fn new(
        job_id: impl Into<String>,
        name: impl Into<String>,
        schedule_expression: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            name: name.into(),
            schedule_expression: schedule_expression.into(),
            priority: JobPriority::default(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            tags: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay_seconds: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Mutable runtime fields of a registered job. Owned by the registry and
/// mutated only by the scheduler loop after each execution attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Start time of the most recent attempt.
    pub last_run: Option<DateTime<Utc>>,
    /// Next natural fire time. `None` while disabled or inert.
    pub next_run: Option<DateTime<Utc>>,
    /// Completed runs.
    pub run_count: u64,
    /// Failed attempts (including timeouts).
    pub failure_count: u64,
    /// Retries consumed in the current failure chain. Resets on success and
    /// at each natural fire.
    pub attempts_used: u32,
}

/// Partial update applied via `update_config`. `None` fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfigUpdate {
    pub enabled: Option<bool>,
    pub schedule_expression: Option<String>,
    pub priority: Option<JobPriority>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = JobSpec::new("crypto_quotes", "Crypto Quotes", "every 1 minutes");
        assert_eq!(spec.job_id, "crypto_quotes");
        assert_eq!(spec.priority, JobPriority::Medium);
        assert_eq!(spec.timeout_seconds, 3600);
        assert_eq!(spec.max_retries, 3);
        assert_eq!(spec.retry_delay_seconds, 60);
        assert!(spec.enabled);
        assert!(spec.tags.is_empty());
        assert!(spec.dependencies.is_empty());
    }

    #[test]
    fn test_spec_builders() {
        let spec = JobSpec::new("esg_collection", "ESG Collection", "daily at 02:00")
            .with_priority(JobPriority::High)
            .with_timeout(300)
            .with_retries(2, 30)
            .with_tags(["esg", "daily"])
            .with_dependencies(["data_cleaning"])
            .disabled();

        assert_eq!(spec.priority, JobPriority::High);
        assert_eq!(spec.timeout_seconds, 300);
        assert_eq!(spec.max_retries, 2);
        assert_eq!(spec.retry_delay_seconds, 30);
        assert!(spec.tags.contains("esg"));
        assert!(spec.dependencies.contains("data_cleaning"));
        assert!(!spec.enabled);
    }

    #[test]
    fn test_spec_serde_roundtrip() {
        let spec = JobSpec::new("forex_quotes", "Forex Quotes", "every 5 minutes")
            .with_tags(["forex"]);
        let json = serde_json::to_string(&spec).unwrap();
        let back: JobSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, spec.job_id);
        assert_eq!(back.schedule_expression, spec.schedule_expression);
        assert_eq!(back.tags, spec.tags);
    }

    #[test]
    fn test_spec_serde_defaults_fill_missing_fields() {
        let json = r#"{
            "job_id": "jse_quotes",
            "name": "JSE Quotes",
            "schedule_expression": "every 2 minutes",
            "created_at": "2025-06-01T00:00:00Z"
        }"#;
        let spec: JobSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.priority, JobPriority::Medium);
        assert_eq!(spec.timeout_seconds, 3600);
        assert!(spec.enabled);
    }

    #[test]
    fn test_state_default() {
        let state = JobState::default();
        assert!(state.last_run.is_none());
        assert!(state.next_run.is_none());
        assert_eq!(state.run_count, 0);
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.attempts_used, 0);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(JobPriority::Low < JobPriority::Medium);
        assert!(JobPriority::Medium < JobPriority::High);
        assert!(JobPriority::High < JobPriority::Critical);
    }
}
