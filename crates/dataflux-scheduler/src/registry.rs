//! Job registry.
//!
//! Thread-safe map of job id to definition, runtime state and work unit.
//! Every mutation goes through the registry's lock, so control-surface
//! calls never race the loop's own bookkeeping. Fire times are derived by
//! re-parsing the stored expression string each time they are needed.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use dataflux_types::{JobConfigUpdate, JobSpec, JobState, JobStatus};

use crate::error::SchedulerError;
use crate::schedule::Schedule;
use crate::work::WorkFn;

struct JobEntry {
    spec: JobSpec,
    state: JobState,
    work: WorkFn,
}

/// A job selected for dispatch on this tick.
pub(crate) struct ClaimedJob {
    pub spec: JobSpec,
    pub work: WorkFn,
}

/// Read-only copy of a job's definition and runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub spec: JobSpec,
    pub state: JobState,
}

/// Answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusInfo {
    pub job_id: String,
    pub name: String,
    pub status: JobStatus,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub failure_count: u64,
}

/// Registry of all known jobs.
///
/// # Example
///
/// ```ignore
/// let registry = JobRegistry::new();
/// registry.register(spec, work, Utc::now())?;
/// let due = registry.claim_due(Utc::now(), None, &HashSet::new());
/// ```
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new job.
    ///
    /// The schedule expression is validated up front even for disabled
    /// jobs; `next_run` is only computed when the job is enabled.
    ///
    /// # Errors
    ///
    /// `DuplicateJob` when the id is taken, `Schedule` when the expression
    /// does not parse.
    pub fn register(
        &self,
        spec: JobSpec,
        work: WorkFn,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let schedule = Schedule::parse(&spec.schedule_expression)?;

        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&spec.job_id) {
            return Err(SchedulerError::DuplicateJob(spec.job_id.clone()));
        }

        let state = JobState {
            next_run: spec.enabled.then(|| schedule.next_fire_time(now)),
            ..JobState::default()
        };
        jobs.insert(spec.job_id.clone(), JobEntry { spec, state, work });
        Ok(())
    }

    /// Enable a job and compute its next fire time from `now`.
    pub fn enable(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write().unwrap();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        entry.spec.enabled = true;
        entry.state.next_run = recompute_next_run(&entry.spec, now);
        Ok(())
    }

    /// Disable a job. Its `next_run` is cleared and the loop will never
    /// select it until re-enabled.
    pub fn disable(&self, job_id: &str) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write().unwrap();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        entry.spec.enabled = false;
        entry.state.next_run = None;
        Ok(())
    }

    /// Remove a job entirely.
    pub fn remove(&self, job_id: &str) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write().unwrap();
        jobs.remove(job_id)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))
    }

    /// Apply a partial configuration update, revalidating the schedule
    /// expression when it changes.
    pub fn update_config(
        &self,
        job_id: &str,
        update: JobConfigUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        // Validate before taking the write lock.
        if let Some(expr) = &update.schedule_expression {
            Schedule::parse(expr)?;
        }

        let mut jobs = self.jobs.write().unwrap();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        if let Some(expr) = update.schedule_expression {
            entry.spec.schedule_expression = expr;
        }
        if let Some(enabled) = update.enabled {
            entry.spec.enabled = enabled;
        }
        if let Some(priority) = update.priority {
            entry.spec.priority = priority;
        }
        if let Some(timeout) = update.timeout_seconds {
            entry.spec.timeout_seconds = timeout;
        }
        if let Some(max_retries) = update.max_retries {
            entry.spec.max_retries = max_retries;
        }
        if let Some(delay) = update.retry_delay_seconds {
            entry.spec.retry_delay_seconds = delay;
        }

        entry.state.next_run = if entry.spec.enabled {
            recompute_next_run(&entry.spec, now)
        } else {
            None
        };
        Ok(())
    }

    /// Select every enabled job whose fire time has arrived, advancing its
    /// `next_run` to the next natural fire so a skipped or running job
    /// simply waits for its next scheduled time.
    ///
    /// Jobs in `exclude` (the in-process running set) still have their
    /// fire consumed but are not returned. When `available` is exhausted
    /// the remaining due jobs are left untouched for the next tick.
    pub(crate) fn claim_due(
        &self,
        now: DateTime<Utc>,
        available: Option<usize>,
        exclude: &HashSet<String>,
    ) -> Vec<ClaimedJob> {
        let mut jobs = self.jobs.write().unwrap();
        let mut claimed = Vec::new();
        let mut capacity = available.unwrap_or(usize::MAX);

        for entry in jobs.values_mut() {
            let due = entry.spec.enabled
                && entry.state.next_run.is_some_and(|next| next <= now);
            if !due {
                continue;
            }

            if exclude.contains(&entry.spec.job_id) {
                // Still running; consume this fire and wait for the next.
                entry.state.next_run = recompute_next_run(&entry.spec, now);
                continue;
            }

            if capacity == 0 {
                continue;
            }
            capacity -= 1;

            entry.state.next_run = recompute_next_run(&entry.spec, now);
            entry.state.attempts_used = 0;
            claimed.push(ClaimedJob {
                spec: entry.spec.clone(),
                work: entry.work.clone(),
            });
        }
        claimed
    }

    /// Record the outcome of one execution attempt.
    pub fn record_outcome(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
        success: bool,
        retry_scheduled: bool,
    ) {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.state.last_run = Some(started_at);
            if success {
                entry.state.run_count += 1;
                entry.state.attempts_used = 0;
            } else {
                entry.state.failure_count += 1;
                if retry_scheduled {
                    entry.state.attempts_used += 1;
                }
            }
        }
    }

    /// Spec and work unit for an out-of-band dispatch (retries).
    pub(crate) fn entry(&self, job_id: &str) -> Option<(JobSpec, WorkFn)> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(job_id)
            .map(|e| (e.spec.clone(), e.work.clone()))
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(job_id).map(|e| JobSnapshot {
            spec: e.spec.clone(),
            state: e.state.clone(),
        })
    }

    /// Status answer for one job. `running` comes from the caller's
    /// running set; the registry itself does not track in-flight work.
    pub fn status_info(&self, job_id: &str, running: bool) -> Option<JobStatusInfo> {
        let jobs = self.jobs.read().unwrap();
        jobs.get(job_id).map(|e| {
            let status = if running {
                JobStatus::Running
            } else if e.state.next_run.is_some() {
                JobStatus::Scheduled
            } else {
                JobStatus::Pending
            };
            JobStatusInfo {
                job_id: e.spec.job_id.clone(),
                name: e.spec.name.clone(),
                status,
                enabled: e.spec.enabled,
                last_run: e.state.last_run,
                next_run: e.state.next_run,
                run_count: e.state.run_count,
                failure_count: e.state.failure_count,
            }
        })
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.read().unwrap().contains_key(job_id)
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-parse the stored expression and compute the next fire time. A job
/// whose expression no longer parses becomes inert: `next_run` cleared,
/// logged, never selected again, never fatal.
fn recompute_next_run(spec: &JobSpec, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match Schedule::parse(&spec.schedule_expression) {
        Ok(schedule) => Some(schedule.next_fire_time(now)),
        Err(e) => {
            warn!(job = %spec.job_id, "Unparseable schedule expression, job is inert: {}", e);
            None
        }
    }
}
