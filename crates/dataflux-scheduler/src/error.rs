//! Error types for the scheduler crate.

use thiserror::Error;

use dataflux_store::StoreError;

use crate::schedule::ScheduleParseError;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Schedule expression could not be parsed
    #[error("Invalid schedule expression: {0}")]
    Schedule(#[from] ScheduleParseError),

    /// A job with this id is already registered
    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    /// No job registered under this id
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Scheduler loop is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler loop is not running
    #[error("Scheduler is not running")]
    NotRunning,

    /// Error from the shared store
    #[error(transparent)]
    Store(#[from] StoreError),
}
