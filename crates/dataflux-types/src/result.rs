//! Execution results.
//!
//! A `JobResult` is created when an attempt starts and finalized exactly
//! once; the result store keeps one record per attempt plus a "latest"
//! pointer per job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
///
/// The executor only ever produces `Running -> Completed | Failed`.
/// `Scheduled` is a registry-level annotation for a job waiting on its next
/// fire time, and `Pending` covers disabled or inert jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// True for the two terminal attempt outcomes.
    pub fn is_terminal(self) -> bool {
        match self {
            JobStatus::Completed | JobStatus::Failed => true,
            JobStatus::Pending | JobStatus::Scheduled | JobStatus::Running => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Record of a single execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    /// `None` while the attempt is still running.
    pub end_time: Option<DateTime<Utc>>,
    /// Wall time spent waiting on the work unit, in milliseconds.
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    /// Opaque value returned by the work unit; not interpreted.
    pub payload: Option<serde_json::Value>,
}

impl JobResult {
    /// A freshly started attempt.
    pub fn running(job_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Running,
            start_time,
            end_time: None,
            duration_ms: None,
            error_message: None,
            payload: None,
        }
    }

    /// Finalize as completed with the work unit's payload.
    pub fn completed(
        mut self,
        payload: Option<serde_json::Value>,
        end_time: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        self.status = JobStatus::Completed;
        self.end_time = Some(end_time);
        self.duration_ms = Some(duration_ms);
        self.payload = payload;
        self
    }

    /// Finalize as failed with the captured error message.
    pub fn failed(
        mut self,
        error_message: impl Into<String>,
        end_time: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        self.status = JobStatus::Failed;
        self.end_time = Some(end_time);
        self.duration_ms = Some(duration_ms);
        self.error_message = Some(error_message.into());
        self
    }

    /// Seconds since the epoch of the attempt start; the history key suffix.
    pub fn epoch_seconds(&self) -> i64 {
        self.start_time.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Scheduled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let back: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, JobStatus::Failed);
    }

    #[test]
    fn test_result_lifecycle_completed() {
        let start = Utc::now();
        let result = JobResult::running("crypto_quotes", start);
        assert_eq!(result.status, JobStatus::Running);
        assert!(result.end_time.is_none());

        let end = start + chrono::Duration::seconds(2);
        let result = result.completed(Some(serde_json::json!({"count": 100})), end, 2000);
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.end_time, Some(end));
        assert_eq!(result.duration_ms, Some(2000));
        assert!(result.error_message.is_none());
        assert_eq!(result.payload.unwrap()["count"], 100);
    }

    #[test]
    fn test_result_lifecycle_failed() {
        let start = Utc::now();
        let end = start + chrono::Duration::seconds(1);
        let result = JobResult::running("forex_quotes", start).failed("connection refused", end, 1000);
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("connection refused"));
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_result_epoch_seconds() {
        let start = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let result = JobResult::running("jse_quotes", start);
        assert_eq!(result.epoch_seconds(), start.timestamp());
    }

    #[test]
    fn test_result_serde_roundtrip() {
        let start = Utc::now();
        let result = JobResult::running("market_news", start).completed(None, start, 10);
        let json = serde_json::to_string(&result).unwrap();
        let back: JobResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, "market_news");
        assert_eq!(back.status, JobStatus::Completed);
        assert_eq!(back.duration_ms, Some(10));
    }
}
