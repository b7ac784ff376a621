//! Error types for session operations.

use coffer_redis::RedisError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
///
/// Not-found is never an error here: a missing or expired backend record
/// loads as an empty session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend could not be reached, or a command on it failed.
    #[error("Session backend error: {0}")]
    Backend(#[from] RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether the backend was unreachable or a connection could not be
    /// prepared (dial, `AUTH`, `SELECT`, timeouts).
    pub fn is_connectivity_error(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_connectivity_error(),
            _ => false,
        }
    }
}
