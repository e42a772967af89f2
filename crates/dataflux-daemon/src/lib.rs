//! DataFlux daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, stop, status, jobs)
//! - `etl`: The platform's standard collection and processing job catalog

pub mod cli;
pub mod commands;
pub mod etl;

pub use cli::{Cli, Commands, JobsCommands};
pub use commands::{handle_jobs, show_status, start_daemon, stop_daemon};
pub use etl::register_collection_jobs;
