//! Scheduler loop and control surface.
//!
//! One `Scheduler` value owns its registry and store handles; there is no
//! process-wide singleton. The loop ticks at a fixed interval, claims due
//! jobs, and dispatches each onto its own task so a slow or hung job can
//! never block the loop. Dispatch re-checks dependencies, takes the
//! distributed lock, executes with the timeout ceiling, persists the
//! result, updates the registry, and schedules a deferred retry on
//! failure. Every per-job error is caught at the dispatch boundary.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dataflux_store::{JobStateStore, KeySpace, KvStore, LockManager, ResultStore};
use dataflux_types::{JobConfigUpdate, JobResult, JobSpec, JobStatus};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::deps::DependencyResolver;
use crate::error::SchedulerError;
use crate::executor::Executor;
use crate::jitter::JitterConfig;
use crate::registry::{ClaimedJob, JobRegistry, JobSnapshot, JobStatusInfo};
use crate::retry::RetryPolicy;
use crate::work::WorkFn;

/// The scheduler: registry, loop lifecycle and control surface.
pub struct Scheduler {
    inner: Arc<Inner>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    registry: JobRegistry,
    locks: LockManager,
    results: Arc<ResultStore>,
    state_store: JobStateStore,
    resolver: DependencyResolver,
    executor: Executor,
    /// Job ids with a dispatch in flight in this process.
    running: Mutex<HashSet<String>>,
    jitter: JitterConfig,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    /// Replaced with a fresh token on every `start`.
    shutdown: Mutex<CancellationToken>,
    is_running: AtomicBool,
}

/// Removes its job id from the running set when dropped, so a panicking
/// dispatch still frees the slot.
struct RunningGuard {
    inner: Arc<Inner>,
    job_id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.running.lock().unwrap().remove(&self.job_id);
    }
}

impl Scheduler {
    /// Build a scheduler over the given store with the system clock.
    pub fn new(kv: Arc<dyn KvStore>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_clock(kv, config, Arc::new(SystemClock))
    }

    /// Build a scheduler with an injected clock. Tests pair this with
    /// `ManualClock` and drive the loop through [`Scheduler::poll_due`].
    pub fn with_clock(
        kv: Arc<dyn KvStore>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        let keys = KeySpace::new(config.namespace.as_str())?;
        let results = Arc::new(ResultStore::new(
            kv.clone(),
            keys.clone(),
            config.history_retention(),
        ));
        let inner = Arc::new(Inner {
            registry: JobRegistry::new(),
            locks: LockManager::new(kv.clone(), keys.clone(), config.lock_ttl()),
            resolver: DependencyResolver::new(results.clone()),
            results,
            state_store: JobStateStore::new(kv, keys),
            executor: Executor::new(clock.clone()),
            running: Mutex::new(HashSet::new()),
            jitter: JitterConfig::new(config.max_dispatch_jitter_ms),
            config,
            clock,
            shutdown: Mutex::new(CancellationToken::new()),
            is_running: AtomicBool::new(false),
        });
        Ok(Self {
            inner,
            loop_task: Mutex::new(None),
        })
    }

    /// Register a job and its work unit.
    ///
    /// # Errors
    ///
    /// `DuplicateJob` for a taken id, `Schedule` for an unparseable
    /// expression.
    pub async fn register(&self, spec: JobSpec, work: WorkFn) -> Result<(), SchedulerError> {
        let name = spec.name.clone();
        let job_id = spec.job_id.clone();
        self.inner
            .registry
            .register(spec, work, self.inner.clock.now())?;
        info!(job = %job_id, name = %name, "Registered job");
        self.persist_definition(&job_id).await;
        Ok(())
    }

    pub async fn enable(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.inner.registry.enable(job_id, self.inner.clock.now())?;
        info!(job = %job_id, "Enabled job");
        self.persist_definition(job_id).await;
        Ok(())
    }

    pub async fn disable(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.inner.registry.disable(job_id)?;
        info!(job = %job_id, "Disabled job");
        self.persist_definition(job_id).await;
        Ok(())
    }

    pub async fn remove(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.inner.registry.remove(job_id)?;
        info!(job = %job_id, "Removed job");
        if let Err(e) = self.inner.state_store.delete_definition(job_id).await {
            warn!(job = %job_id, "Failed to delete persisted definition: {}", e);
        }
        Ok(())
    }

    pub async fn update_config(
        &self,
        job_id: &str,
        update: JobConfigUpdate,
    ) -> Result<(), SchedulerError> {
        self.inner
            .registry
            .update_config(job_id, update, self.inner.clock.now())?;
        info!(job = %job_id, "Updated job configuration");
        self.persist_definition(job_id).await;
        Ok(())
    }

    /// Current status of one job, or `None` when unknown.
    pub fn job_status(&self, job_id: &str) -> Option<JobStatusInfo> {
        let running = self.inner.running.lock().unwrap().contains(job_id);
        self.inner.registry.status_info(job_id, running)
    }

    /// Registry snapshot of one job.
    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.inner.registry.snapshot(job_id)
    }

    /// All registered job ids, sorted.
    pub fn job_ids(&self) -> Vec<String> {
        self.inner.registry.job_ids()
    }

    /// Execution history, newest first.
    pub async fn history(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<JobResult>, SchedulerError> {
        Ok(self.inner.results.get_history(job_id, limit).await?)
    }

    /// Latest persisted result, the value dependency checks read.
    pub async fn latest_result(&self, job_id: &str) -> Result<Option<JobResult>, SchedulerError> {
        Ok(self.inner.results.get_latest(job_id).await?)
    }

    /// Start the loop.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.inner.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        *self.inner.shutdown.lock().unwrap() = shutdown.clone();

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.tick_interval());
            info!(
                tick_ms = inner.config.tick_interval_ms,
                "Scheduler loop started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => Inner::poll_due(&inner).await,
                }
            }
            info!("Scheduler loop stopped");
        });
        *self.loop_task.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stop the loop. In-flight jobs observe the cancelled token through
    /// their work units; the loop task is joined before returning.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        if !self.inner.is_running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        self.inner.shutdown.lock().unwrap().cancel();
        let handle = self.loop_task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// Run one loop pass immediately. This is what each tick executes;
    /// embedders and tests can drive scheduling without the background
    /// task.
    pub async fn poll_due(&self) {
        Inner::poll_due(&self.inner).await;
    }

    async fn persist_definition(&self, job_id: &str) {
        if let Some(snapshot) = self.inner.registry.snapshot(job_id) {
            if let Err(e) = self
                .inner
                .state_store
                .save_definition(&snapshot.spec, &snapshot.state)
                .await
            {
                warn!(job = %job_id, "Failed to persist job definition: {}", e);
            }
        }
    }
}

impl Inner {
    /// One tick: claim every due job and dispatch each fire-and-forget.
    async fn poll_due(inner: &Arc<Inner>) {
        let now = inner.clock.now();
        let running_snapshot = inner.running.lock().unwrap().clone();
        let available = inner
            .config
            .max_concurrent
            .map(|max| max.saturating_sub(running_snapshot.len()));
        if available == Some(0) {
            debug!("Concurrency ceiling reached, deferring dispatch");
            return;
        }

        let claimed = inner.registry.claim_due(now, available, &running_snapshot);
        for job in claimed {
            let job_id = job.spec.job_id.clone();
            if !inner.running.lock().unwrap().insert(job_id.clone()) {
                debug!(job = %job_id, "Already running in this process, skipping");
                continue;
            }
            let guard = RunningGuard {
                inner: inner.clone(),
                job_id: job_id.clone(),
            };
            let inner = inner.clone();
            tokio::spawn(async move {
                let jitter = inner.jitter.generate();
                if !jitter.is_zero() {
                    tokio::time::sleep(jitter).await;
                }
                let retry_delay = Inner::dispatch(&inner, &job).await;
                drop(guard);
                if let Some(delay) = retry_delay {
                    Inner::spawn_retry(inner, job_id, delay);
                }
            });
        }
    }

    /// Dependency-check, lock-acquire, execute, persist, bookkeep.
    /// Returns the retry delay when a failed attempt still has budget.
    /// The caller owns the running-set slot.
    async fn dispatch(inner: &Arc<Inner>, job: &ClaimedJob) -> Option<Duration> {
        let job_id = job.spec.job_id.as_str();

        if !inner.resolver.dependencies_met(&job.spec).await {
            debug!(job = %job_id, "Dependencies not met, deferring to next scheduled run");
            return None;
        }

        let lock = match inner.locks.acquire(job_id).await {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                info!(job = %job_id, "Lock held by another scheduler, skipping");
                return None;
            }
            Err(e) => {
                warn!(job = %job_id, "Lock acquisition failed: {}", e);
                return None;
            }
        };

        if let Err(e) = inner
            .state_store
            .save_status(job_id, JobStatus::Running, inner.clock.now())
            .await
        {
            warn!(job = %job_id, "Failed to persist running status: {}", e);
        }

        let cancel = inner.shutdown.lock().unwrap().clone();
        let result = inner.executor.execute(&job.spec, job.work.clone(), &cancel).await;

        // History write failures never abort a finished cycle.
        if let Err(e) = inner.results.record(&result).await {
            warn!(job = %job_id, "Failed to store job result: {}", e);
        }

        if let Err(e) = inner.locks.release(&lock).await {
            warn!(job = %job_id, "Failed to release lock: {}", e);
        }

        let success = result.status == JobStatus::Completed;
        let retry_delay = if success {
            None
        } else {
            let attempts_used = inner
                .registry
                .snapshot(job_id)
                .map(|s| s.state.attempts_used)
                .unwrap_or(0);
            RetryPolicy::from_spec(&job.spec).next_delay(attempts_used)
        };

        inner
            .registry
            .record_outcome(job_id, result.start_time, success, retry_delay.is_some());

        if let Some(snapshot) = inner.registry.snapshot(job_id) {
            if let Err(e) = inner
                .state_store
                .save_definition(&snapshot.spec, &snapshot.state)
                .await
            {
                warn!(job = %job_id, "Failed to persist job definition: {}", e);
            }
        }
        if let Err(e) = inner
            .state_store
            .save_status(job_id, result.status, inner.clock.now())
            .await
        {
            warn!(job = %job_id, "Failed to persist job status: {}", e);
        }

        retry_delay
    }

    /// Defer an out-of-band re-attempt. The retry re-enters the full
    /// dispatch path; the job's regular `next_run` is untouched.
    fn spawn_retry(inner: Arc<Inner>, job_id: String, delay: Duration) {
        info!(job = %job_id, delay_s = delay.as_secs(), "Scheduling retry");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Inner::redispatch(inner, job_id).await;
        });
    }

    /// Boxed to keep the retry chain's future type finite.
    fn redispatch(
        inner: Arc<Inner>,
        job_id: String,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            if inner.shutdown.lock().unwrap().is_cancelled() {
                debug!(job = %job_id, "Scheduler stopped, dropping retry");
                return;
            }
            let Some((spec, work)) = inner.registry.entry(&job_id) else {
                debug!(job = %job_id, "Job removed before retry");
                return;
            };
            if !spec.enabled {
                debug!(job = %job_id, "Job disabled before retry");
                return;
            }
            if !inner.running.lock().unwrap().insert(job_id.clone()) {
                debug!(job = %job_id, "Already running in this process, retry skipped");
                return;
            }
            let guard = RunningGuard {
                inner: inner.clone(),
                job_id: job_id.clone(),
            };
            let retry_delay = Inner::dispatch(&inner, &ClaimedJob { spec, work }).await;
            drop(guard);
            if let Some(delay) = retry_delay {
                Inner::spawn_retry(inner, job_id, delay);
            }
        })
    }
}
