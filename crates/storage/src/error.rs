//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Could not reach the backing store
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backing store rejected or failed a command
    #[error("Command error: {0}")]
    Command(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
