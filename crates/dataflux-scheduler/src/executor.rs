//! Job execution.
//!
//! Each attempt runs the work unit on its own tokio task and races the
//! join handle against the job's timeout ceiling. When the ceiling elapses
//! first the executor cancels the work unit's token and stops waiting; the
//! spawned task itself is not aborted, so a work unit that ignores its
//! token keeps running in the background. That leak is a documented
//! property of the timeout contract, not an accident: only cooperative
//! cancellation is offered.

use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dataflux_types::{JobResult, JobSpec};

use crate::clock::Clock;
use crate::work::WorkFn;

pub struct Executor {
    clock: Arc<dyn Clock>,
}

impl Executor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run one attempt to completion, timeout, or panic. Never returns an
    /// error: every outcome is a finalized [`JobResult`].
    pub async fn execute(
        &self,
        spec: &JobSpec,
        work: WorkFn,
        cancel: &CancellationToken,
    ) -> JobResult {
        let start_time = self.clock.now();
        let started = Instant::now();
        let running = JobResult::running(&spec.job_id, start_time);

        info!(job = %spec.job_id, "Job started");

        let work_token = cancel.child_token();
        let mut handle = tokio::spawn((work)(work_token.clone()));

        let joined = if spec.timeout_seconds == 0 {
            // No ceiling configured; wait for the unit itself.
            (&mut handle).await
        } else {
            tokio::select! {
                joined = &mut handle => joined,
                _ = sleep(Duration::from_secs(spec.timeout_seconds)) => {
                    work_token.cancel();
                    let duration_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        job = %spec.job_id,
                        timeout_s = spec.timeout_seconds,
                        "Job timed out; a non-cooperative work unit may still be running"
                    );
                    return running.failed(
                        format!(
                            "job '{}' timed out after {} seconds",
                            spec.job_id, spec.timeout_seconds
                        ),
                        self.clock.now(),
                        duration_ms,
                    );
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let end_time = self.clock.now();

        match joined {
            Ok(Ok(payload)) => {
                info!(job = %spec.job_id, duration_ms, "Job completed");
                running.completed(Some(payload), end_time, duration_ms)
            }
            Ok(Err(e)) => {
                error!(job = %spec.job_id, duration_ms, "Job failed: {:#}", e);
                running.failed(format!("{:#}", e), end_time, duration_ms)
            }
            Err(join_err) => {
                error!(job = %spec.job_id, "Work unit panicked: {}", join_err);
                running.failed(
                    format!("work unit panicked: {}", join_err),
                    end_time,
                    duration_ms,
                )
            }
        }
    }
}
