//! Error types for the coalescer.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from coalescer construction and its callers.
///
/// The running worker never produces one of these for the consumer: input
/// closure and cancellation are silent completions.
#[derive(Error, Debug)]
pub enum CoalesceError {
    #[error("{name} period must be greater than zero (got {value:?})")]
    InvalidPeriod { name: &'static str, value: Duration },

    #[error("{name} period is too long to schedule (got {value:?})")]
    PeriodTooLong { name: &'static str, value: Duration },

    #[error("Coalescer worker failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("Failed to load config: {reason}")]
    ConfigError { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },
}

impl From<notify::Error> for CoalesceError {
    fn from(e: notify::Error) -> Self {
        CoalesceError::WatchFailed {
            path: e.paths.first().cloned().unwrap_or_default(),
            reason: e.to_string(),
        }
    }
}

impl From<figment::Error> for CoalesceError {
    fn from(e: figment::Error) -> Self {
        CoalesceError::ConfigError {
            reason: e.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for CoalesceError {
    fn from(e: tokio::task::JoinError) -> Self {
        CoalesceError::WorkerFailed {
            reason: e.to_string(),
        }
    }
}
