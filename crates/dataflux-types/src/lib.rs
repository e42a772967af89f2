//! # dataflux-types
//!
//! Shared domain types for the DataFlux job scheduler:
//! - Job definitions: static specs, runtime state, config patches
//! - Execution results: status enum and per-run records
//! - Settings: layered configuration for the daemon

pub mod config;
pub mod error;
pub mod job;
pub mod result;

pub use config::Settings;
pub use error::DatafluxError;
pub use job::{JobConfigUpdate, JobPriority, JobSpec, JobState};
pub use result::{JobResult, JobStatus};
