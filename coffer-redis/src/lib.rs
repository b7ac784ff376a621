//! # Coffer Redis
//!
//! Pooled Redis connections for the session store.
//!
//! ## Features
//!
//! - **Bounded Pool**: At most `max_active` borrowed connections, at most
//!   `max_idle` kept for reuse
//! - **Prepared Connections**: `AUTH` and `SELECT` run on every new dial
//! - **Liveness Probing**: Connections idle for a minute are `PING`ed before reuse
//! - **Memory Backend**: An in-process server for tests and local development
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coffer_redis::{RedisConfig, RedisPool};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .address("127.0.0.1:6379")
//!         .password("abc123")
//!         .database(0)
//!         .build();
//!
//!     // No connection is dialed until the first borrow.
//!     let pool = RedisPool::connect_lazy(config)?;
//!
//!     let mut conn = pool.get().await?;
//!     conn.set_ex("greeting", b"hello", Duration::from_secs(60)).await?;
//!     let value = conn.get("greeting").await?;
//!     assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Without a Server
//!
//! ```
//! use coffer_redis::{MemoryServer, RedisConfig, RedisPool};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let server = MemoryServer::new();
//! let pool = RedisPool::new(server.connector(), RedisConfig::default()).unwrap();
//!
//! let mut conn = pool.get().await.unwrap();
//! assert!(!conn.del("missing").await.unwrap());
//! # });
//! ```

mod config;
mod connection;
mod error;
mod memory;
mod pool;

pub use config::{DEFAULT_ADDRESS, RedisConfig, RedisConfigBuilder, seconds};
pub use connection::{Connect, Connection, RedisConnector};
pub use error::{RedisError, Result};
pub use memory::{DEFAULT_DATABASES, MemoryConnection, MemoryConnector, MemoryServer, MemoryStats};
pub use pool::{PoolState, PoolStats, PooledConnection, RedisPool};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use coffer_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::connection::{Connect, Connection};
    pub use crate::error::{RedisError, Result};
    pub use crate::memory::MemoryServer;
    pub use crate::pool::{PooledConnection, RedisPool};
}
