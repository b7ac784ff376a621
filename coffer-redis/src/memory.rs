//! In-process backend speaking the session command set.
//!
//! `MemoryServer` behaves like a single Redis instance for the commands the
//! pool issues: it enforces `requirepass`, keeps numbered databases, honours
//! `EX` expiry, and can be taken offline or restarted to exercise failure
//! paths. It is meant for tests and local development, not production.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::connection::{Connect, Connection, ttl_seconds};
use crate::{RedisError, Result};

/// Number of logical databases, matching a stock Redis server.
pub const DEFAULT_DATABASES: u32 = 16;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
struct ServerState {
    databases: u32,
    password: Option<String>,
    entries: Mutex<HashMap<(u32, String), Entry>>,
    online: AtomicBool,
    epoch: AtomicU64,
    dials: AtomicU64,
    pings: AtomicU64,
    commands: AtomicU64,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

/// Counters describing how a [`MemoryServer`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Connections accepted.
    pub dials: u64,
    /// `PING` commands received.
    pub pings: u64,
    /// `GET`/`SET`/`DEL` commands received.
    pub commands: u64,
    /// Connections currently open.
    pub open_connections: usize,
    /// Highest number of simultaneously open connections.
    pub peak_connections: usize,
}

/// An in-process, Redis-like key-value server.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    state: Arc<ServerState>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// Create a server with no password and [`DEFAULT_DATABASES`] databases.
    pub fn new() -> Self {
        Self::build(None, DEFAULT_DATABASES)
    }

    /// Create a server that requires `AUTH password`.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self::build(Some(password.into()), DEFAULT_DATABASES)
    }

    fn build(password: Option<String>, databases: u32) -> Self {
        Self {
            state: Arc::new(ServerState {
                databases,
                password,
                entries: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
                epoch: AtomicU64::new(0),
                dials: AtomicU64::new(0),
                pings: AtomicU64::new(0),
                commands: AtomicU64::new(0),
                open: AtomicUsize::new(0),
                peak_open: AtomicUsize::new(0),
            }),
        }
    }

    /// A connector dialing this server.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Refuse new connections and fail commands on existing ones.
    pub fn go_offline(&self) {
        self.state.online.store(false, Ordering::SeqCst);
    }

    /// Accept connections again.
    pub fn go_online(&self) {
        self.state.online.store(true, Ordering::SeqCst);
    }

    /// Drop every open connection while keeping the data, as a server restart
    /// behind a persistent volume would.
    pub fn restart(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether `key` exists (and has not expired) in `database`.
    pub fn contains(&self, database: u32, key: &str) -> bool {
        let now = Instant::now();
        self.state
            .entries
            .lock()
            .get(&(database, key.to_string()))
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remaining time to live of `key`, if it exists and has an expiry.
    pub fn ttl(&self, database: u32, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.state.entries.lock();
        let entry = entries.get(&(database, key.to_string()))?;
        if !entry.is_live(now) {
            return None;
        }
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Store a raw value directly, bypassing any connection.
    pub fn insert_raw(&self, database: u32, key: &str, value: impl Into<Vec<u8>>) {
        self.state.entries.lock().insert(
            (database, key.to_string()),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Number of live keys across all databases.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state
            .entries
            .lock()
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the server holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            dials: self.state.dials.load(Ordering::SeqCst),
            pings: self.state.pings.load(Ordering::SeqCst),
            commands: self.state.commands.load(Ordering::SeqCst),
            open_connections: self.state.open.load(Ordering::SeqCst),
            peak_connections: self.state.peak_open.load(Ordering::SeqCst),
        }
    }
}

/// Connector for a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

#[async_trait]
impl Connect for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection> {
        let state = &self.server.state;
        if !state.online.load(Ordering::SeqCst) {
            return Err(RedisError::Connection("connection refused".to_string()));
        }
        state.dials.fetch_add(1, Ordering::SeqCst);
        let open = state.open.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_open.fetch_max(open, Ordering::SeqCst);

        Ok(MemoryConnection {
            state: Arc::clone(state),
            epoch: state.epoch.load(Ordering::SeqCst),
            database: 0,
            authenticated: state.password.is_none(),
        })
    }
}

/// A connection to a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<ServerState>,
    epoch: u64,
    database: u32,
    authenticated: bool,
}

impl MemoryConnection {
    fn check_transport(&self) -> Result<()> {
        if !self.state.online.load(Ordering::SeqCst)
            || self.state.epoch.load(Ordering::SeqCst) != self.epoch
        {
            return Err(RedisError::Connection("connection reset by peer".to_string()));
        }
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        self.check_transport()?;
        if !self.authenticated {
            return Err(RedisError::Command("NOAUTH Authentication required.".to_string()));
        }
        self.state.commands.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn auth(&mut self, _username: Option<&str>, password: &str) -> Result<()> {
        self.check_transport()?;
        match &self.state.password {
            None => Err(RedisError::Auth(
                "ERR AUTH <password> called without any password configured".to_string(),
            )),
            Some(expected) if expected == password => {
                self.authenticated = true;
                Ok(())
            }
            Some(_) => Err(RedisError::Auth(
                "WRONGPASS invalid username-password pair".to_string(),
            )),
        }
    }

    async fn select(&mut self, database: u32) -> Result<()> {
        self.check_transport()?;
        if !self.authenticated {
            return Err(RedisError::Select {
                database,
                message: "NOAUTH Authentication required.".to_string(),
            });
        }
        if database >= self.state.databases {
            return Err(RedisError::Select {
                database,
                message: "ERR DB index is out of range".to_string(),
            });
        }
        self.database = database;
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.check_transport()?;
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_ready()?;
        let now = Instant::now();
        let mut entries = self.state.entries.lock();
        let slot = (self.database, key.to_string());
        match entries.get(&slot) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(&slot);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check_ready()?;
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl_seconds(ttl)))
            .ok_or_else(|| RedisError::Command("invalid expire time in 'set' command".to_string()))?;
        self.state.entries.lock().insert(
            (self.database, key.to_string()),
            Entry {
                value: value.to_vec(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        self.check_ready()?;
        let now = Instant::now();
        let removed = self
            .state
            .entries
            .lock()
            .remove(&(self.database, key.to_string()));
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }
}
