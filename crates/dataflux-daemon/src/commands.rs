//! Command implementations for the DataFlux daemon.
//!
//! Handles:
//! - start: Load config, connect the shared store, run the scheduler
//! - stop: Signal the running daemon via its PID file
//! - status: Check whether the daemon is running
//! - jobs: Read-only queries served straight from the shared store

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use dataflux_scheduler::{Scheduler, SchedulerConfig};
use dataflux_store::{JobStateStore, KeySpace, KvStore, MemoryKv, RedisKv, ResultStore};
use dataflux_types::Settings;

use crate::cli::JobsCommands;
use crate::etl::register_collection_jobs;

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| {
            #[cfg(unix)]
            {
                dirs.runtime_dir()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf())
            }
            #[cfg(not(unix))]
            {
                dirs.cache_dir().to_path_buf()
            }
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("dataflux")
        .join("daemon.pid")
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;
    info!("Wrote PID file: {:?}", pid_path);
    Ok(())
}

fn remove_pid_file() {
    let pid_path = pid_file_path();
    if pid_path.exists() {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

fn read_pid_file() -> Option<u32> {
    fs::read_to_string(pid_file_path())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 checks process existence without touching it.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Connect the shared store, honoring the degraded-mode policy: an
/// unreachable store aborts startup unless `allow_degraded` is set, in
/// which case a process-local store is substituted and distributed
/// locking no longer applies.
async fn connect_store(settings: &Settings) -> Result<Arc<dyn KvStore>> {
    let connected: Result<RedisKv> = async {
        let kv = RedisKv::connect(&settings.redis_url)
            .await
            .context("Failed to connect to the shared store")?;
        kv.ping()
            .await
            .context("Shared store did not answer ping")?;
        Ok(kv)
    }
    .await;

    match connected {
        Ok(kv) => {
            info!(url = %settings.redis_url, "Connected to shared store");
            Ok(Arc::new(kv))
        }
        Err(e) if settings.allow_degraded => {
            warn!(
                "Shared store unavailable ({:#}); running degraded with an \
                 in-process store. Locks are process-local: run a single \
                 scheduler instance only.",
                e
            );
            Ok(Arc::new(MemoryKv::new()))
        }
        Err(e) => Err(e.context(
            "Shared store is required for distributed locking; set \
             allow_degraded = true to run single-instance without it",
        )),
    }
}

/// Start the scheduler daemon.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Connect the shared store (fatal when unreachable, unless degraded
///    mode is explicitly allowed)
/// 3. Register the standard job catalog and start the loop
/// 4. Shut down gracefully on SIGINT/SIGTERM
pub async fn start_daemon(
    config_path: Option<&str>,
    foreground: bool,
    redis_url_override: Option<&str>,
    namespace_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    // CLI overrides have the highest precedence.
    if let Some(url) = redis_url_override {
        settings.redis_url = url.to_string();
    }
    if let Some(ns) = namespace_override {
        settings.namespace = ns.to_string();
    }
    if let Some(level) = log_level_override {
        settings.log_level = level.to_string();
    }
    settings.validate().context("Invalid configuration")?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("DataFlux daemon starting...");
    info!("Configuration:");
    info!("  Store URL: {}", settings.redis_url);
    info!("  Namespace: {}", settings.namespace);
    info!("  Tick interval: {}ms", settings.tick_interval_ms);
    info!("  Log level: {}", settings.log_level);

    if !foreground {
        warn!("Background mode not yet implemented, running in foreground");
        warn!("Use a process manager (systemd, launchd) for background operation");
    }

    let kv = connect_store(&settings).await?;
    let scheduler = Scheduler::new(kv, SchedulerConfig::from_settings(&settings))?;

    let registered = register_collection_jobs(&scheduler).await?;
    info!("Registered {} collection jobs", registered);

    write_pid_file()?;
    scheduler.start().await?;

    wait_for_shutdown_signal().await;

    info!("Shutting down scheduler...");
    if let Err(e) = scheduler.stop().await {
        warn!("Error during scheduler shutdown: {}", e);
    }
    remove_pid_file();
    info!("Daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Stop the running daemon by sending SIGTERM.
pub fn stop_daemon() -> Result<()> {
    let pid = read_pid_file().context("No PID file found - daemon may not be running")?;

    if !is_process_running(pid) {
        remove_pid_file();
        anyhow::bail!("Daemon not running (stale PID file removed)");
    }

    #[cfg(unix)]
    {
        unsafe {
            if libc::kill(pid as i32, libc::SIGTERM) != 0 {
                anyhow::bail!("Failed to send SIGTERM to daemon");
            }
        }
        println!("Sent SIGTERM to daemon (PID {})", pid);
        Ok(())
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!("Stop command not yet implemented on this platform");
    }
}

/// Show daemon status based on the PID file.
pub fn show_status() -> Result<()> {
    match read_pid_file() {
        Some(pid) if is_process_running(pid) => {
            println!("Daemon running (PID {})", pid);
        }
        Some(_) => {
            println!("Daemon not running (stale PID file)");
        }
        None => {
            println!("Daemon not running");
        }
    }
    Ok(())
}

/// Read-only job queries against the shared store. These serve consumers
/// in other processes; no scheduler needs to run locally.
pub async fn handle_jobs(
    config_path: Option<&str>,
    redis_url_override: Option<&str>,
    command: JobsCommands,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(url) = redis_url_override {
        settings.redis_url = url.to_string();
    }

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKv::connect(&settings.redis_url)
            .await
            .context("Failed to connect to the shared store")?,
    );
    let keys = KeySpace::new(settings.namespace.as_str())?;
    let state_store = JobStateStore::new(kv.clone(), keys.clone());

    match command {
        JobsCommands::List => {
            let ids = state_store.list_job_ids().await?;
            if ids.is_empty() {
                println!("No persisted job definitions");
                return Ok(());
            }
            for id in ids {
                match state_store.load_definition(&id).await? {
                    Some(job) => println!(
                        "{:<32} {:<28} enabled={:<5} runs={} failures={}",
                        job.spec.job_id,
                        job.spec.schedule_expression,
                        job.spec.enabled,
                        job.state.run_count,
                        job.state.failure_count,
                    ),
                    None => println!("{:<32} <definition expired>", id),
                }
            }
        }
        JobsCommands::Status { job_id } => {
            let definition = state_store
                .load_definition(&job_id)
                .await?
                .with_context(|| format!("No persisted definition for job '{}'", job_id))?;
            let status = state_store.load_status(&job_id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "definition": definition,
                    "status": status,
                }))?
            );
        }
        JobsCommands::History { job_id, limit } => {
            let results = ResultStore::new(
                kv,
                keys,
                std::time::Duration::from_secs(settings.history_retention_seconds),
            );
            let history = results.get_history(&job_id, limit).await?;
            if history.is_empty() {
                println!("No history for job '{}'", job_id);
                return Ok(());
            }
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}
