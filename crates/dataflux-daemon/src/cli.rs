//! CLI argument parsing for the DataFlux daemon.

use clap::{Parser, Subcommand};

/// DataFlux Scheduler Daemon
///
/// Distributed background job scheduler for the DataFlux platform.
#[derive(Parser, Debug)]
#[command(name = "dataflux-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/dataflux/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Override the shared store URL
        #[arg(long)]
        redis_url: Option<String>,

        /// Override the key namespace
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status
    Status,

    /// Read-only job queries against the shared store
    Jobs {
        /// Override the shared store URL
        #[arg(long)]
        redis_url: Option<String>,

        #[command(subcommand)]
        command: JobsCommands,
    },
}

/// Job query subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum JobsCommands {
    /// List all persisted job definitions
    List,

    /// Show the persisted definition and transient status of one job
    Status {
        /// Job id to inspect
        job_id: String,
    },

    /// Show execution history, newest first
    History {
        /// Job id to inspect
        job_id: String,

        /// Maximum records
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}
