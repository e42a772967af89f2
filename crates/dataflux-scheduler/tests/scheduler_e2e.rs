//! End-to-end scheduler scenarios over an in-process store.
//!
//! Time is driven two ways: the `ManualClock` controls fire-time
//! arithmetic, and the paused tokio runtime controls sleeps (timeouts,
//! retry delays), so every scenario is deterministic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use dataflux_scheduler::{work_fn, Clock, ManualClock, Scheduler, SchedulerConfig, SchedulerError};
use dataflux_store::{KvStore, MemoryKv};
use dataflux_types::{JobConfigUpdate, JobSpec, JobStatus};

fn setup() -> (Arc<MemoryKv>, Arc<ManualClock>, Scheduler) {
    setup_with_config(SchedulerConfig::default())
}

fn setup_with_config(config: SchedulerConfig) -> (Arc<MemoryKv>, Arc<ManualClock>, Scheduler) {
    let kv = Arc::new(MemoryKv::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
    ));
    let scheduler = Scheduler::with_clock(kv.clone(), config, clock.clone()).unwrap();
    (kv, clock, scheduler)
}

/// Poll a predicate until it holds; paused time makes this fast.
async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(60), async {
        while !cond() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for: {}", what));
}

#[tokio::test(start_paused = true)]
async fn ping_runs_exactly_once_in_61_seconds() {
    let (_kv, clock, scheduler) = setup();

    scheduler
        .register(
            JobSpec::new("ping", "Ping", "every 1 minutes"),
            work_fn(|_cancel| async move { Ok(serde_json::json!({"ok": true})) }),
        )
        .await
        .unwrap();

    // Not due yet.
    scheduler.poll_due().await;
    clock.advance(chrono::Duration::seconds(30));
    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.job_status("ping").unwrap().run_count, 0);

    // 61 simulated seconds after registration.
    clock.advance(chrono::Duration::seconds(31));
    scheduler.poll_due().await;
    wait_until("ping completes once", || {
        scheduler.job_status("ping").unwrap().run_count == 1
    })
    .await;

    // Further polls at the same instant never re-fire.
    scheduler.poll_due().await;
    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;

    let status = scheduler.job_status("ping").unwrap();
    assert_eq!(status.run_count, 1);
    assert_eq!(status.failure_count, 0);
    assert_eq!(status.status, JobStatus::Scheduled);

    let latest = scheduler.latest_result("ping").await.unwrap().unwrap();
    assert_eq!(latest.status, JobStatus::Completed);
    assert_eq!(latest.payload.unwrap()["ok"], true);
}

#[tokio::test(start_paused = true)]
async fn dependent_job_waits_for_dependency_completion() {
    let (_kv, clock, scheduler) = setup();

    let b_calls = Arc::new(AtomicU32::new(0));
    let b_counter = b_calls.clone();
    scheduler
        .register(
            JobSpec::new("b", "Upstream", "daily at 23:00"),
            work_fn(move |_cancel| {
                let calls = b_counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({"records": 10}))
                }
            }),
        )
        .await
        .unwrap();
    scheduler
        .register(
            JobSpec::new("a", "Downstream", "every 1 minutes").with_dependencies(["b"]),
            work_fn(|_cancel| async move { Ok(serde_json::json!({})) }),
        )
        .await
        .unwrap();

    // Several fire times for `a` pass; `b` has never completed.
    for _ in 0..3 {
        clock.advance(chrono::Duration::seconds(61));
        scheduler.poll_due().await;
        sleep(Duration::from_millis(50)).await;
    }
    let status = scheduler.job_status("a").unwrap();
    assert_eq!(status.run_count, 0);
    assert_ne!(status.status, JobStatus::Running);

    // Let `b` fire and complete.
    clock.set(Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 1).unwrap());
    scheduler.poll_due().await;
    wait_until("b completes", || b_calls.load(Ordering::SeqCst) == 1).await;

    // The next fire of `a` now goes through.
    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    wait_until("a completes after b", || {
        scheduler.job_status("a").unwrap().run_count >= 1
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn disabled_job_is_never_selected() {
    let (_kv, clock, scheduler) = setup();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    scheduler
        .register(
            JobSpec::new("cache_cleanup", "Cache Cleanup", "every 1 minutes"),
            work_fn(move |_cancel| {
                let calls = counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({}))
                }
            }),
        )
        .await
        .unwrap();

    scheduler.disable("cache_cleanup").await.unwrap();
    assert!(scheduler
        .job_status("cache_cleanup")
        .unwrap()
        .next_run
        .is_none());

    for _ in 0..5 {
        clock.advance(chrono::Duration::seconds(61));
        scheduler.poll_due().await;
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Re-enabling restores the schedule from now.
    scheduler.enable("cache_cleanup").await.unwrap();
    assert!(scheduler
        .job_status("cache_cleanup")
        .unwrap()
        .next_run
        .is_some());

    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    wait_until("job runs after re-enable", || {
        calls.load(Ordering::SeqCst) == 1
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_fast_and_releases_lock() {
    let (kv, clock, scheduler) = setup();

    scheduler
        .register(
            JobSpec::new("slow", "Slow Collection", "every 1 minutes")
                .with_timeout(1)
                .with_retries(0, 0),
            work_fn(|_cancel| async move {
                sleep(Duration::from_secs(5)).await;
                Ok(serde_json::json!({}))
            }),
        )
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    wait_until("timeout recorded", || {
        scheduler.job_status("slow").unwrap().failure_count == 1
    })
    .await;

    let history = scheduler.history("slow", 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Failed);
    let message = history[0].error_message.clone().unwrap();
    assert!(message.contains("timed out"), "message: {}", message);

    // Duration reflects the 1s ceiling, not the 5s the unit sleeps.
    let duration = history[0].duration_ms.unwrap();
    assert!((900..=1500).contains(&duration), "duration_ms = {}", duration);

    // The lock is released promptly despite the leaked worker.
    assert!(kv.get("dataflux:job_lock:slow").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_job_retries_until_budget_exhausted() {
    let (_kv, clock, scheduler) = setup();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    scheduler
        .register(
            JobSpec::new("flaky", "Flaky Feed", "every 1 minutes").with_retries(2, 5),
            work_fn::<_, _, ()>(move |_cancel| {
                let calls = counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("upstream down")
                }
            }),
        )
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(61));
    let next_run_after_claim = {
        scheduler.poll_due().await;
        wait_until("first failure", || calls.load(Ordering::SeqCst) >= 1).await;
        scheduler.job_status("flaky").unwrap().next_run
    };

    // Initial attempt plus two retries, each deferred by the retry delay,
    // without any clock advance toward the next natural fire.
    wait_until("retry budget consumed", || {
        calls.load(Ordering::SeqCst) == 3
    })
    .await;

    // No fourth attempt arrives.
    sleep(Duration::from_secs(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let status = scheduler.job_status("flaky").unwrap();
    assert_eq!(status.failure_count, 3);
    assert_eq!(status.run_count, 0);

    // Retries were out of band: the regular schedule never moved.
    assert_eq!(scheduler.job_status("flaky").unwrap().next_run, next_run_after_claim);
}

#[tokio::test(start_paused = true)]
async fn foreign_lock_skips_execution_until_freed() {
    let (kv, clock, scheduler) = setup();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    scheduler
        .register(
            JobSpec::new("contended", "Contended", "every 1 minutes"),
            work_fn(move |_cancel| {
                let calls = counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({}))
                }
            }),
        )
        .await
        .unwrap();

    // Another scheduler process holds the lock.
    kv.set("dataflux:job_lock:contended", "foreign-token")
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.job_status("contended").unwrap().run_count, 0);

    // Once freed, the next natural fire runs normally.
    kv.delete("dataflux:job_lock:contended").await.unwrap();
    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    wait_until("job runs after lock freed", || {
        calls.load(Ordering::SeqCst) == 1
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn max_concurrent_bounds_dispatch() {
    let config = SchedulerConfig {
        max_concurrent: Some(1),
        ..Default::default()
    };
    let (_kv, clock, scheduler) = setup_with_config(config);

    let gate = Arc::new(Notify::new());
    for job_id in ["gate_a", "gate_b"] {
        let gate = gate.clone();
        scheduler
            .register(
                JobSpec::new(job_id, job_id, "every 1 minutes"),
                work_fn(move |_cancel| {
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        Ok(serde_json::json!({}))
                    }
                }),
            )
            .await
            .unwrap();
    }

    clock.advance(chrono::Duration::seconds(61));
    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;

    let running = |id: &str| scheduler.job_status(id).unwrap().status == JobStatus::Running;
    assert_eq!(
        [running("gate_a"), running("gate_b")]
            .iter()
            .filter(|r| **r)
            .count(),
        1,
        "exactly one job may hold the single slot"
    );

    // Free the first; the second is still due and claims the slot.
    gate.notify_one();
    wait_until("first job completes", || {
        !running("gate_a") && !running("gate_b")
    })
    .await;

    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    wait_until("both jobs eventually ran", || {
        let a = scheduler.job_status("gate_a").unwrap().run_count;
        let b = scheduler.job_status("gate_b").unwrap().run_count;
        a + b == 2
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn update_config_changes_schedule_and_disable() {
    let (_kv, clock, scheduler) = setup();

    scheduler
        .register(
            JobSpec::new("report", "Weekly Report", "weekly on monday at 06:00"),
            work_fn(|_cancel| async move { Ok(serde_json::json!({})) }),
        )
        .await
        .unwrap();

    scheduler
        .update_config(
            "report",
            JobConfigUpdate {
                schedule_expression: Some("every 2 hours".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let next = scheduler.job_status("report").unwrap().next_run.unwrap();
    assert_eq!(next, clock.now() + chrono::Duration::hours(2));

    scheduler
        .update_config(
            "report",
            JobConfigUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(scheduler.job_status("report").unwrap().next_run.is_none());

    // Unknown job ids surface as errors.
    let err = scheduler
        .update_config("ghost", JobConfigUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn removed_job_never_runs_again() {
    let (_kv, clock, scheduler) = setup();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    scheduler
        .register(
            JobSpec::new("tmp", "Temporary", "every 1 minutes"),
            work_fn(move |_cancel| {
                let calls = counter.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({}))
                }
            }),
        )
        .await
        .unwrap();

    scheduler.remove("tmp").await.unwrap();
    assert!(scheduler.job_status("tmp").is_none());

    clock.advance(chrono::Duration::seconds(120));
    scheduler.poll_due().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn loop_lifecycle_start_stop() {
    let (_kv, _clock, scheduler) = setup();

    assert!(!scheduler.is_running());
    scheduler.start().await.unwrap();
    assert!(scheduler.is_running());

    assert!(matches!(
        scheduler.start().await,
        Err(SchedulerError::AlreadyRunning)
    ));

    scheduler.stop().await.unwrap();
    assert!(!scheduler.is_running());
    assert!(matches!(
        scheduler.stop().await,
        Err(SchedulerError::NotRunning)
    ));

    // The loop can be restarted after a stop.
    scheduler.start().await.unwrap();
    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn results_and_definitions_are_persisted() {
    let (kv, clock, scheduler) = setup();

    scheduler
        .register(
            JobSpec::new("jse_quotes", "JSE Quotes", "every 2 minutes"),
            work_fn(|_cancel| async move { Ok(serde_json::json!({"count": 7})) }),
        )
        .await
        .unwrap();

    // Registration already persists the definition record.
    assert!(kv
        .get("dataflux:job_def:jse_quotes")
        .await
        .unwrap()
        .is_some());

    clock.advance(chrono::Duration::seconds(121));
    scheduler.poll_due().await;
    wait_until("run recorded", || {
        scheduler.job_status("jse_quotes").unwrap().run_count == 1
    })
    .await;

    let def = kv
        .get("dataflux:job_def:jse_quotes")
        .await
        .unwrap()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&def).unwrap();
    assert_eq!(parsed["run_count"], 1);

    let status = kv
        .get("dataflux:job_status:jse_quotes")
        .await
        .unwrap()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(parsed["status"], "completed");

    let history = scheduler.history("jse_quotes", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payload.as_ref().unwrap()["count"], 7);
}
