//! Session manager.

use coffer_redis::RedisPool;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::SessionBackend;
use crate::codec::{BincodeCodec, SessionCodec};
use crate::config::SessionConfig;
use crate::cookies::ResponseCookies;
use crate::error::SessionResult;
use crate::id::SessionId;
use crate::session::Session;

/// State shared by the manager and every session it hands out.
pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    pub(crate) backend: Arc<dyn SessionBackend>,
    pub(crate) codec: Arc<dyn SessionCodec>,
}

/// Creates and loads sessions.
///
/// Holds the configuration and the backend. Cloning is cheap; clones share
/// the same backend (and its connection pool).
///
/// # Examples
///
/// ```
/// use coffer_redis::{MemoryServer, RedisConfig, RedisPool};
/// use coffer_session::{ResponseCookies, SessionConfig, SessionManager};
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let server = MemoryServer::new();
/// let config = SessionConfig::default();
/// let pool = RedisPool::new(server.connector(), config.redis.clone()).unwrap();
/// let manager = SessionManager::with_backend(config, pool).unwrap();
///
/// let mut session = manager.create(ResponseCookies::new());
/// session.set("user", "alice");
/// session.save().await.unwrap();
///
/// let again = manager.load(*session.id(), ResponseCookies::new()).await.unwrap();
/// assert_eq!(again.get("user").and_then(|v| v.as_str()), Some("alice"));
/// # });
/// ```
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create a manager backed by the Redis server in `config.redis`.
    ///
    /// The pool is created lazily: no connection is made until the first
    /// session is loaded or saved.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let pool = RedisPool::connect_lazy(config.redis.clone())?;
        Self::with_backend(config, pool)
    }

    /// Create a manager around any backend.
    pub fn with_backend(config: SessionConfig, backend: impl SessionBackend) -> SessionResult<Self> {
        config.validate()?;

        info!(
            cookie_name = %config.cookie_name,
            key_prefix = %config.key_prefix,
            ttl = ?config.ttl,
            "Session manager created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                backend: Arc::new(backend),
                codec: Arc::new(BincodeCodec),
            }),
        })
    }

    /// Replace the payload codec.
    ///
    /// Records written with a different codec will fail to load.
    pub fn with_codec(self, codec: impl SessionCodec) -> Self {
        debug!(codec = codec.name(), "Session codec replaced");
        Self {
            shared: Arc::new(Shared {
                config: self.shared.config.clone(),
                backend: Arc::clone(&self.shared.backend),
                codec: Arc::new(codec),
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Start a new, empty session with a fresh identifier.
    ///
    /// Does not touch the backend.
    pub fn create(&self, cookies: ResponseCookies) -> Session {
        let id = SessionId::random();
        debug!(session_id = %id, "Session created");
        Session::new(id, Arc::clone(&self.shared), cookies)
    }

    /// Load the session stored under `id`.
    ///
    /// A missing or expired record yields an empty session bound to `id`.
    /// Backend and decoding errors are returned.
    pub async fn load(&self, id: SessionId, cookies: ResponseCookies) -> SessionResult<Session> {
        let mut session = Session::new(id, Arc::clone(&self.shared), cookies);
        session.load().await?;
        Ok(session)
    }

    /// Load the session named by an incoming cookie value, or create one when
    /// there is no cookie or its value is not a session identifier.
    pub async fn resolve(
        &self,
        cookie_value: Option<&str>,
        cookies: ResponseCookies,
    ) -> SessionResult<Session> {
        match cookie_value.map(str::parse::<SessionId>) {
            Some(Ok(id)) => self.load(id, cookies).await,
            Some(Err(_)) => {
                debug!("Ignoring malformed session cookie");
                Ok(self.create(cookies))
            }
            None => Ok(self.create(cookies)),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.shared.config)
            .field("codec", &self.shared.codec.name())
            .finish()
    }
}
