//! Redis configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{RedisError, Result};

/// Redis configuration.
///
/// Durations are (de)serialized as whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server address, either `host:port` or a `redis://` / `rediss://` URL.
    pub address: String,
    /// Username for Redis 6+ ACL (sent with `AUTH` when a password is set).
    pub username: Option<String>,
    /// Password. When set, every new connection runs `AUTH` before use.
    pub password: Option<String>,
    /// Logical database selected on every new connection.
    pub database: u32,
    /// Maximum number of concurrently borrowed connections (0 = unbounded).
    pub max_active: u32,
    /// Maximum number of idle connections kept for reuse.
    pub max_idle: u32,
    /// Idle connections older than this are closed instead of reused
    /// (zero disables expiry).
    #[serde(with = "seconds")]
    pub idle_timeout: Duration,
    /// Idle connections older than this are probed with `PING` before reuse.
    #[serde(with = "seconds")]
    pub liveness_check_after: Duration,
    /// Bound on dialing a new connection.
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
    /// Bound on a single command round-trip.
    #[serde(with = "seconds")]
    pub command_timeout: Duration,
    /// Bound on waiting for a free slot when `max_active` connections are out.
    #[serde(with = "seconds")]
    pub wait_timeout: Duration,
}

/// Default server address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            username: None,
            password: None,
            database: 0,
            max_active: 16,
            max_idle: 8,
            idle_timeout: Duration::from_secs(3600),
            liveness_check_after: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Create a new configuration for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> RedisConfigBuilder {
        RedisConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> RedisConfigBuilder {
        let mut builder = RedisConfigBuilder::new();

        if let Ok(address) = std::env::var("REDIS_ADDRESS") {
            builder = builder.address(address);
        }

        if let Ok(username) = std::env::var("REDIS_USERNAME") {
            builder = builder.username(username);
        }

        if let Ok(password) = std::env::var("REDIS_PASSWORD") {
            builder = builder.password(password);
        }

        if let Ok(db) = std::env::var("REDIS_DATABASE")
            && let Ok(db_num) = db.parse() {
                builder = builder.database(db_num);
            }

        if let Ok(max_active) = std::env::var("REDIS_MAX_ACTIVE")
            && let Ok(n) = max_active.parse() {
                builder = builder.max_active(n);
            }

        if let Ok(max_idle) = std::env::var("REDIS_MAX_IDLE")
            && let Ok(n) = max_idle.parse() {
                builder = builder.max_idle(n);
            }

        if let Ok(idle_timeout) = std::env::var("REDIS_IDLE_TIMEOUT")
            && let Ok(secs) = idle_timeout.parse() {
                builder = builder.idle_timeout(Duration::from_secs(secs));
            }

        builder
    }

    /// The URL handed to the Redis client.
    ///
    /// Credentials and database are deliberately left out: they are applied
    /// with explicit `AUTH` and `SELECT` commands after dialing.
    pub fn connection_url(&self) -> String {
        let address = self.address.trim();
        if address.starts_with("redis://") || address.starts_with("rediss://") {
            address.to_string()
        } else {
            format!("redis://{}", address)
        }
    }

    /// Check the configuration for values the pool cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(RedisError::Config("address must not be empty".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(RedisError::Config("connect_timeout must be non-zero".to_string()));
        }
        if self.command_timeout.is_zero() {
            return Err(RedisError::Config("command_timeout must be non-zero".to_string()));
        }
        if self.wait_timeout.is_zero() {
            return Err(RedisError::Config("wait_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Redis configuration.
#[derive(Default)]
pub struct RedisConfigBuilder {
    config: RedisConfig,
}

impl RedisConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RedisConfig::default(),
        }
    }

    /// Set the server address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Set the username (Redis 6+ ACL).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the database number.
    pub fn database(mut self, db: u32) -> Self {
        self.config.database = db;
        self
    }

    /// Set the maximum number of borrowed connections.
    pub fn max_active(mut self, max_active: u32) -> Self {
        self.config.max_active = max_active;
        self
    }

    /// Set the maximum number of idle connections.
    pub fn max_idle(mut self, max_idle: u32) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set how long a connection may sit idle before it is probed on borrow.
    pub fn liveness_check_after(mut self, after: Duration) -> Self {
        self.config.liveness_check_after = after;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the wait timeout.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RedisConfig {
        self.config
    }
}

/// Serde adapter storing a [`Duration`] as whole seconds.
///
/// Use with `#[serde(with = "coffer_redis::seconds")]`.
pub mod seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.address, "127.0.0.1:6379");
        assert_eq!(config.database, 0);
        assert_eq!(config.idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.liveness_check_after, Duration::from_secs(60));
        assert!(config.password.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RedisConfig::builder()
            .address("cache.internal:6380")
            .password("abc123")
            .database(3)
            .max_active(100)
            .max_idle(4)
            .idle_timeout(Duration::from_secs(120))
            .build();

        assert_eq!(config.address, "cache.internal:6380");
        assert_eq!(config.password.as_deref(), Some("abc123"));
        assert_eq!(config.database, 3);
        assert_eq!(config.max_active, 100);
        assert_eq!(config.max_idle, 4);
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_connection_url() {
        assert_eq!(
            RedisConfig::new("127.0.0.1:6379").connection_url(),
            "redis://127.0.0.1:6379"
        );
        assert_eq!(
            RedisConfig::new("rediss://cache:6380").connection_url(),
            "rediss://cache:6380"
        );
        // Password never leaks into the URL.
        let config = RedisConfig::builder().password("secret").build();
        assert!(!config.connection_url().contains("secret"));
    }

    #[test]
    fn test_validate_rejects_empty_address() {
        let config = RedisConfig::new("  ");
        assert!(matches!(config.validate(), Err(RedisError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_wait() {
        let config = RedisConfig::builder().wait_timeout(Duration::ZERO).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_as_seconds() {
        let config = RedisConfig::builder()
            .idle_timeout(Duration::from_secs(90))
            .build();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["idle_timeout"], 90);

        let parsed: RedisConfig =
            serde_json::from_str(r#"{"address": "10.0.0.5:6379", "idle_timeout": 30}"#).unwrap();
        assert_eq!(parsed.address, "10.0.0.5:6379");
        assert_eq!(parsed.idle_timeout, Duration::from_secs(30));
        assert_eq!(parsed.max_idle, RedisConfig::default().max_idle);
    }
}
