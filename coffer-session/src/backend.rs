//! Session storage backend.

use async_trait::async_trait;
use coffer_redis::{Connect, RedisPool};
use std::time::Duration;

use crate::error::SessionResult;

/// Storage for encoded session payloads.
///
/// Keys arrive fully prefixed. A missing key is `Ok(None)` from `fetch` and
/// `Ok(false)` from `remove`, never an error.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Read the payload stored under `key`.
    async fn fetch(&self, key: &str) -> SessionResult<Option<Vec<u8>>>;

    /// Write `payload` under `key`, expiring after `ttl`.
    async fn store(&self, key: &str, payload: &[u8], ttl: Duration) -> SessionResult<()>;

    /// Delete `key`. Returns whether it existed.
    async fn remove(&self, key: &str) -> SessionResult<bool>;
}

/// Each call borrows one pooled connection for a single command. The
/// connection goes back to the pool when the call returns, on success and on
/// error alike.
#[async_trait]
impl<C: Connect> SessionBackend for RedisPool<C> {
    async fn fetch(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        let mut conn = self.get().await?;
        Ok(conn.get(key).await?)
    }

    async fn store(&self, key: &str, payload: &[u8], ttl: Duration) -> SessionResult<()> {
        let mut conn = self.get().await?;
        conn.set_ex(key, payload, ttl).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> SessionResult<bool> {
        let mut conn = self.get().await?;
        Ok(conn.del(key).await?)
    }
}
