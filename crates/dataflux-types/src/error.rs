//! Shared error type for configuration loading.

use thiserror::Error;

/// Errors surfaced by the types crate.
#[derive(Debug, Error)]
pub enum DatafluxError {
    /// Configuration could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(String),
}
