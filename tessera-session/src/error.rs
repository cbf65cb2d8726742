//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session expired
    #[error("Session expired: {0}")]
    Expired(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid session ID
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),
}
