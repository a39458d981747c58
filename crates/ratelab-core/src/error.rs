//! Unified error types for ratelab core.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Operator-supplied configuration failed validation.
    #[error("{0}")]
    InvalidConfiguration(String),

    /// A load test is already running on this generator.
    #[error("A test is already running")]
    TestAlreadyRunning,

    /// No load test is running.
    #[error("No running test to stop")]
    TestNotRunning,

    /// Shared store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scheduler worker failed.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration(message.into())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
