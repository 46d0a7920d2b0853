//! Error types for the simflex client engine.
//!
//! Transport and connection failures surface as `ClientError`. Protocol-level
//! failures (unexpected reply content) are not errors in the `Result` sense:
//! per the engine's failure policy they terminate the affected operation and
//! are reported through the event stream instead.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the simflex client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server address \"{url}\": {message}")]
    InvalidAddress { url: String, message: String },

    #[error("Invalid instance id \"{value}\": {message}")]
    InvalidInstanceId { value: String, message: String },

    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Protocol violation in {operation} ({state}): {message}")]
    Protocol {
        operation: String,
        state: String,
        message: String,
    },

    #[error("Client engine is no longer running")]
    EngineGone,
}

/// Result type alias for simflex client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            message: cause.to_string(),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Transport {
            message: err.to_string(),
        }
    }
}
