// Central Error Type for the Application

use crate::port::EngineError;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Startup configuration is incomplete (fatal, not retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backing engine rejected construction of a queue (fatal, not retried)
    #[error("Task can't start {queue}")]
    QueueCreation {
        queue: String,
        #[source]
        source: EngineError,
    },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
