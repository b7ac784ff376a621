//! Redis error types.

use thiserror::Error;

/// Result type for Redis operations.
pub type Result<T> = std::result::Result<T, RedisError>;

/// Redis errors.
#[derive(Debug, Error)]
pub enum RedisError {
    /// Dialing the server failed, or an established connection was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// `AUTH` was rejected while preparing a new connection.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// `SELECT` of the configured database failed while preparing a new connection.
    #[error("Failed to select database {database}: {message}")]
    Select {
        /// The database index that was requested.
        database: u32,
        /// Server or transport message.
        message: String,
    },

    /// An operation did not finish within its configured bound.
    #[error("Timed out {0}")]
    Timeout(&'static str),

    /// The server answered a command with an error reply.
    #[error("Command error: {0}")]
    Command(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying Redis client error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl RedisError {
    /// Whether this error means the backend could not be reached or the
    /// connection could not be prepared (dial, `AUTH`, `SELECT`, timeouts,
    /// dropped transports).
    pub fn is_connectivity_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Auth(_) | Self::Select { .. } | Self::Timeout(_) => true,
            Self::Redis(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
            }
            Self::Command(_) | Self::Config(_) => false,
        }
    }

    /// Check if this error is retryable on a fresh connection.
    pub fn is_retryable(&self) -> bool {
        self.is_connectivity_error() && !matches!(self, Self::Auth(_) | Self::Select { .. })
    }

    /// Whether the connection that produced this error must not be reused.
    pub(crate) fn breaks_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
            || matches!(self, Self::Redis(e) if e.is_io_error() || e.is_connection_dropped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(RedisError::Connection("refused".into()).is_connectivity_error());
        assert!(RedisError::Auth("WRONGPASS".into()).is_connectivity_error());
        assert!(
            RedisError::Select {
                database: 99,
                message: "out of range".into()
            }
            .is_connectivity_error()
        );
        assert!(RedisError::Timeout("waiting for a connection").is_connectivity_error());
        assert!(!RedisError::Command("WRONGTYPE".into()).is_connectivity_error());
        assert!(!RedisError::Config("bad".into()).is_connectivity_error());
    }

    #[test]
    fn test_auth_is_not_retryable() {
        assert!(!RedisError::Auth("WRONGPASS".into()).is_retryable());
        assert!(RedisError::Connection("reset".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = RedisError::Select {
            database: 16,
            message: "ERR DB index is out of range".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to select database 16: ERR DB index is out of range"
        );
        assert_eq!(
            RedisError::Timeout("waiting for a connection").to_string(),
            "Timed out waiting for a connection"
        );
    }
}
