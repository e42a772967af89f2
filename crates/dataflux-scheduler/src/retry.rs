//! Retry policy.
//!
//! A failed attempt earns a one-shot deferred re-invocation after a fixed
//! delay, bounded by the spec's `max_retries` per failure chain. The retry
//! re-enters the normal dependency-check / lock-acquire / execute path; it
//! never bypasses it, and it never touches the job's regular `next_run`.

use std::time::Duration;

use dataflux_types::JobSpec;

/// Per-job retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Configured ceiling on retries per failure chain.
    pub max_retries: u32,
    /// Fixed delay before each deferred attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            max_retries: spec.max_retries,
            delay: Duration::from_secs(spec.retry_delay_seconds),
        }
    }

    /// Delay before the next retry, or `None` once the chain's budget
    /// (`attempts_used`) is exhausted.
    pub fn next_delay(&self, attempts_used: u32) -> Option<Duration> {
        (attempts_used < self.max_retries).then_some(self.delay)
    }
}
