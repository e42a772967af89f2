//! DataFlux Scheduler Daemon
//!
//! Runs the platform's background job scheduler against a shared Redis
//! store.
//!
//! # Usage
//!
//! ```bash
//! dataflux-daemon start [--foreground] [--redis-url URL] [--namespace NS]
//! dataflux-daemon stop
//! dataflux-daemon status
//! dataflux-daemon jobs list
//! dataflux-daemon jobs status <JOB_ID>
//! dataflux-daemon jobs history <JOB_ID> [--limit N]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/dataflux/config.toml)
//! 3. Environment variables (DATAFLUX_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use dataflux_daemon::{
    handle_jobs, show_status, start_daemon, stop_daemon, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            foreground,
            redis_url,
            namespace,
        } => {
            start_daemon(
                cli.config.as_deref(),
                foreground,
                redis_url.as_deref(),
                namespace.as_deref(),
                cli.log_level.as_deref(),
            )
            .await?;
        }
        Commands::Stop => {
            stop_daemon()?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Jobs { redis_url, command } => {
            handle_jobs(cli.config.as_deref(), redis_url.as_deref(), command).await?;
        }
    }

    Ok(())
}
