//! Error types for Yskra Core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter error types
#[derive(Error, Debug)]
pub enum Error {
    // Capability errors
    #[error("Host does not support cross-document messaging, PlayerJS frame unavailable")]
    MessagingUnsupported,

    // Source errors
    #[error("Invalid source URL '{url}': {source}")]
    InvalidSource {
        url: String,
        source: url::ParseError,
    },

    // Host errors
    #[error("Frame host error: {0}")]
    Host(String),

    // Command errors
    #[error("Command '{command}' got no answer within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Command '{command}' cancelled: adapter destroyed")]
    CommandCancelled { command: String },

    // Protocol errors
    #[error("Malformed '{event}' event: {reason}")]
    MalformedEvent { event: String, reason: String },

    // Lifecycle errors
    #[error("Adapter has been destroyed")]
    Destroyed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Error::Host(msg.into())
    }

    /// Create a malformed event error
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CommandTimeout { .. } | Error::MalformedEvent { .. } | Error::Host(_)
        )
    }

    /// Returns the error code for logs and front-end reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MessagingUnsupported => "MESSAGING_UNSUPPORTED",
            Error::InvalidSource { .. } => "INVALID_SOURCE",
            Error::Host(_) => "HOST",
            Error::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            Error::CommandCancelled { .. } => "COMMAND_CANCELLED",
            Error::MalformedEvent { .. } => "MALFORMED_EVENT",
            Error::Destroyed => "DESTROYED",
            Error::Json(_) => "JSON",
        }
    }
}
