//! Redis connection pool.
//!
//! A borrow takes one of `max_active` slots, then reuses the most recently
//! returned idle connection or dials a fresh one. Fresh connections run
//! `AUTH` (when a password is configured) and `SELECT` before they are handed
//! out; idle ones are discarded past `idle_timeout` and probed with `PING`
//! past `liveness_check_after`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::{Connect, Connection, RedisConnector};
use crate::{RedisConfig, RedisError, Result};

struct IdleConnection<T> {
    conn: T,
    returned_at: Instant,
}

#[derive(Default)]
struct Counters {
    dials: AtomicU64,
    probes: AtomicU64,
    discarded: AtomicU64,
}

struct PoolInner<C: Connect> {
    connector: C,
    config: RedisConfig,
    slots: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection<C::Connection>>>,
    counters: Counters,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Connections currently borrowed.
    pub active: usize,
    /// Connections waiting in the idle list.
    pub idle: usize,
}

/// Lifetime counters of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// New connections dialed (including failed handshakes).
    pub dials: u64,
    /// Liveness probes issued on borrow.
    pub probes: u64,
    /// Connections closed because they expired, failed a probe, broke, or
    /// exceeded `max_idle`.
    pub discarded: u64,
}

/// A bounded pool of prepared backend connections.
///
/// Cloning is cheap; clones share the same connections.
pub struct RedisPool<C: Connect = RedisConnector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connect> Clone for RedisPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connect> std::fmt::Debug for RedisPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("address", &self.inner.config.address)
            .field("database", &self.inner.config.database)
            .field("state", &self.state())
            .finish()
    }
}

impl RedisPool<RedisConnector> {
    /// Create a pool for a Redis server. No connection is dialed until the
    /// first borrow.
    pub fn connect_lazy(config: RedisConfig) -> Result<Self> {
        let connector = RedisConnector::new(&config)?;
        Self::new(connector, config)
    }
}

impl<C: Connect> RedisPool<C> {
    /// Create a pool around an arbitrary connector.
    pub fn new(connector: C, config: RedisConfig) -> Result<Self> {
        config.validate()?;

        let slots = match config.max_active {
            0 => Semaphore::MAX_PERMITS,
            n => n as usize,
        };

        info!(
            address = %config.address,
            database = config.database,
            max_active = config.max_active,
            max_idle = config.max_idle,
            "Redis connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                slots: Arc::new(Semaphore::new(slots)),
                idle: Mutex::new(VecDeque::new()),
                counters: Counters::default(),
            }),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.inner.config
    }

    /// Borrow a connection.
    ///
    /// Waits at most `wait_timeout` for a free slot. Dial, `AUTH` and
    /// `SELECT` failures are returned to the caller; nothing is retried
    /// except replacing an idle connection that failed its probe.
    pub async fn get(&self) -> Result<PooledConnection<C>> {
        let permit = tokio::time::timeout(
            self.inner.config.wait_timeout,
            Arc::clone(&self.inner.slots).acquire_owned(),
        )
        .await
        .map_err(|_| {
            warn!(
                max_active = self.inner.config.max_active,
                wait_timeout = ?self.inner.config.wait_timeout,
                "Timed out waiting for a pooled Redis connection"
            );
            RedisError::Timeout("waiting for a pooled connection")
        })?
        .map_err(|_| RedisError::Connection("connection pool is closed".to_string()))?;

        let conn = match self.reuse_idle().await {
            Some(conn) => conn,
            None => self.dial().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            broken: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    async fn reuse_idle(&self) -> Option<C::Connection> {
        let config = &self.inner.config;
        loop {
            let candidate = self.inner.idle.lock().pop_front()?;
            let idle_for = candidate.returned_at.elapsed();

            if !config.idle_timeout.is_zero() && idle_for > config.idle_timeout {
                debug!(idle_for = ?idle_for, "Discarding expired idle connection");
                self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let mut conn = candidate.conn;
            if idle_for >= config.liveness_check_after {
                self.inner.counters.probes.fetch_add(1, Ordering::Relaxed);
                let probe = tokio::time::timeout(config.command_timeout, conn.ping()).await;
                match probe {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(error = %e, idle_for = ?idle_for, "Idle connection failed liveness probe");
                        self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    Err(_) => {
                        warn!(idle_for = ?idle_for, "Idle connection liveness probe timed out");
                        self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                }
            }

            return Some(conn);
        }
    }

    async fn dial(&self) -> Result<C::Connection> {
        let config = &self.inner.config;
        self.inner.counters.dials.fetch_add(1, Ordering::Relaxed);

        let mut conn = tokio::time::timeout(config.connect_timeout, self.inner.connector.connect())
            .await
            .map_err(|_| RedisError::Timeout("connecting to the server"))?
            .inspect_err(|e| warn!(error = %e, address = %config.address, "Failed to dial Redis"))?;

        if let Some(password) = &config.password {
            bounded(config.command_timeout, conn.auth(config.username.as_deref(), password))
                .await
                .inspect_err(|e| warn!(error = %e, "Redis authentication failed"))?;
        }

        bounded(config.command_timeout, conn.select(config.database))
            .await
            .inspect_err(|e| warn!(error = %e, database = config.database, "Redis SELECT failed"))?;

        debug!(address = %config.address, database = config.database, "Dialed new Redis connection");
        Ok(conn)
    }

    /// Current occupancy.
    pub fn state(&self) -> PoolState {
        let idle = self.inner.idle.lock().len();
        let active = match self.inner.config.max_active {
            0 => Semaphore::MAX_PERMITS - self.inner.slots.available_permits(),
            n => n as usize - self.inner.slots.available_permits(),
        };
        PoolState { active, idle }
    }

    /// Lifetime counters.
    pub fn stats(&self) -> PoolStats {
        let counters = &self.inner.counters;
        PoolStats {
            dials: counters.dials.load(Ordering::Relaxed),
            probes: counters.probes.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl<C: Connect> PoolInner<C> {
    fn put_back(&self, conn: C::Connection, broken: bool) {
        if broken {
            debug!("Dropping broken Redis connection");
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let now = Instant::now();
        let mut idle = self.idle.lock();

        if !self.config.idle_timeout.is_zero() {
            let before = idle.len();
            idle.retain(|c| now.duration_since(c.returned_at) <= self.config.idle_timeout);
            let pruned = before - idle.len();
            if pruned > 0 {
                self.counters.discarded.fetch_add(pruned as u64, Ordering::Relaxed);
            }
        }

        if idle.len() < self.config.max_idle as usize {
            idle.push_front(IdleConnection {
                conn,
                returned_at: now,
            });
        } else {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn bounded<T>(limit: Duration, op: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| RedisError::Timeout("waiting for a command reply"))?
}

/// A connection borrowed from a [`RedisPool`].
///
/// Returned to the pool when dropped, on every exit path. Only data commands
/// are exposed, so a borrower cannot re-`SELECT` or re-`AUTH` a connection
/// that later borrowers will inherit. Each command is bounded by
/// `command_timeout`, and a transport failure marks the connection so it is
/// closed instead of reused.
pub struct PooledConnection<C: Connect> {
    conn: Option<C::Connection>,
    broken: bool,
    pool: Arc<PoolInner<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connect> PooledConnection<C> {
    async fn run<'a, T, F, Fut>(&'a mut self, op: F) -> Result<T>
    where
        F: FnOnce(&'a mut C::Connection) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let limit = self.pool.config.command_timeout;
        let Some(conn) = self.conn.as_mut() else {
            return Err(RedisError::Connection("connection already released".to_string()));
        };
        let result = bounded(limit, op(conn)).await;
        if let Err(e) = &result
            && e.breaks_connection()
        {
            self.broken = true;
        }
        result
    }

    /// `GET key`
    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run(|conn| conn.get(key)).await
    }

    /// `SET key value EX ttl`
    pub async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.run(|conn| conn.set_ex(key, value, ttl)).await
    }

    /// `DEL key`
    pub async fn del(&mut self, key: &str) -> Result<bool> {
        self.run(|conn| conn.del(key)).await
    }

    /// `PING`
    pub async fn ping(&mut self) -> Result<()> {
        self.run(|conn| conn.ping()).await
    }
}

impl<C: Connect> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("address", &self.pool.config.address)
            .field("broken", &self.broken)
            .finish()
    }
}

impl<C: Connect> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn, self.broken);
        }
    }
}
