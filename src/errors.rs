//! Error types for docquery
//!
//! One taxonomy for every failure the query client can observe. All of them
//! terminate at the client boundary and are reported through the snapshot;
//! only `Validation` is also returned to the caller of `submit`.

use thiserror::Error;

/// Message shown when the backend gives no usable detail
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Message shown for any connection-level failure of an event stream
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Please try again.";

/// Main error type for the query client
#[derive(Error, Debug)]
pub enum QueryError {
    /// Query rejected before any network action
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection refused, dropped, or unreadable
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured error payload returned by the backend
    #[error("Server error: {message}")]
    Server {
        status: Option<u16>,
        message: String,
    },

    /// A single stream frame that could not be decoded
    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),

    /// No activity within the configured idle window
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// State machine transition errors
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Human-readable message for the observable surface.
    ///
    /// Server and validation errors are surfaced verbatim; everything else
    /// falls back to its display form, and an empty message falls back to
    /// [`GENERIC_ERROR_MESSAGE`].
    pub fn user_message(&self) -> String {
        let message = match self {
            QueryError::Validation(msg)
            | QueryError::Server { message: msg, .. }
            | QueryError::Transport(msg)
            | QueryError::Generic(msg) => msg.trim().to_string(),
            other => other.to_string(),
        };

        if message.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// Connection-level failure (as opposed to a structured server answer)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            QueryError::Transport(_) | QueryError::Timeout { .. } | QueryError::HttpError(_)
        )
    }
}

/// Convert anyhow errors to QueryError
impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Generic(err.to_string())
    }
}
