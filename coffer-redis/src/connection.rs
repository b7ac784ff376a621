//! Backend connection abstraction.
//!
//! The pool only needs the handful of commands a session store issues. They
//! are expressed as a trait so the same pool drives a real Redis server and
//! the in-process [`MemoryServer`](crate::MemoryServer).

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::debug;

use crate::{RedisConfig, RedisError, Result};

/// One physical connection to the backend.
#[async_trait]
pub trait Connection: Send + 'static {
    /// `AUTH [username] password`
    async fn auth(&mut self, username: Option<&str>, password: &str) -> Result<()>;

    /// `SELECT database`
    async fn select(&mut self, database: u32) -> Result<()>;

    /// `PING`
    async fn ping(&mut self) -> Result<()>;

    /// `GET key`. A missing key is `Ok(None)`.
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `SET key value EX ttl`
    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// `DEL key`. Returns whether a key was removed.
    async fn del(&mut self, key: &str) -> Result<bool>;
}

/// Dials raw, unprepared connections.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: Connection;

    /// Open one new connection. Authentication and database selection are
    /// performed afterwards by the pool.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// Connector for a real Redis server.
#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    address: String,
}

impl RedisConnector {
    /// Create a connector from configuration. Does not dial.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_url())
            .map_err(|e| RedisError::Config(e.to_string()))?;
        Ok(Self {
            client,
            address: config.address.clone(),
        })
    }
}

impl std::fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnector")
            .field("address", &self.address)
            .finish()
    }
}

#[async_trait]
impl Connect for RedisConnector {
    type Connection = MultiplexedConnection;

    async fn connect(&self) -> Result<MultiplexedConnection> {
        debug!(address = %self.address, "Dialing Redis");
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Connection for MultiplexedConnection {
    async fn auth(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        let mut cmd = redis::cmd("AUTH");
        if let Some(username) = username {
            cmd.arg(username);
        }
        cmd.arg(password);
        let _: () = cmd
            .query_async(self)
            .await
            .map_err(|e| RedisError::Auth(e.to_string()))?;
        Ok(())
    }

    async fn select(&mut self, database: u32) -> Result<()> {
        let _: () = redis::cmd("SELECT")
            .arg(database)
            .query_async(self)
            .await
            .map_err(|e| RedisError::Select {
                database,
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(self).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(self).await?;
        Ok(value)
    }

    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(self)
            .await?;
        Ok(())
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        let removed: u64 = redis::cmd("DEL").arg(key).query_async(self).await?;
        Ok(removed > 0)
    }
}

/// `EX` takes whole seconds and rejects zero.
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
