//! Server-side sessions for Coffer.
//!
//! A client carries only an opaque identifier in a cookie; the session's
//! values live in Redis under `key_prefix + identifier`, expiring after the
//! configured TTL.
//!
//! # Lifecycle
//!
//! 1. [`SessionLayer`] reads the identifier cookie and asks the
//!    [`SessionManager`] for the session: loaded from the backend when the
//!    cookie names one, freshly created otherwise.
//! 2. The handler takes the [`Session`], reads and mutates it. Nothing is
//!    written yet.
//! 3. The handler calls [`Session::save`]. A cleared session deletes its
//!    record; a modified, non-empty one is stored with a refreshed TTL. Either
//!    way the identifier cookie is issued. An untouched session costs nothing.
//!
//! # Features
//!
//! - `axum` - `Session` as an axum extractor (enabled by default)
//!
//! # Examples
//!
//! ## Handlers with axum
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use coffer_session::{Session, SessionConfig, SessionLayer, SessionManager};
//!
//! async fn visits(mut session: Session) -> String {
//!     let count = session.get("visits").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
//!     session.set("visits", count);
//!     match session.save().await {
//!         Ok(()) => format!("visit #{}", count),
//!         Err(e) => format!("could not save session: {}", e),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::new(SessionConfig::from_env())?;
//!     let app: Router = Router::new()
//!         .route("/", get(visits))
//!         .layer(SessionLayer::new(manager));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Without a framework
//!
//! ```
//! use coffer_redis::{MemoryServer, RedisPool};
//! use coffer_session::*;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let server = MemoryServer::new();
//! let config = SessionConfig::default();
//! let pool = RedisPool::new(server.connector(), config.redis.clone()).unwrap();
//! let manager = SessionManager::with_backend(config, pool).unwrap();
//!
//! let cookies = ResponseCookies::new();
//! let mut session = manager.resolve(None, cookies.clone()).await.unwrap();
//! session.set("user_id", 123);
//! session.save().await.unwrap();
//!
//! let cookie = cookies.get("session").unwrap();
//! assert_eq!(cookie.value(), session.id().to_string());
//! # });
//! ```

mod backend;
mod codec;
mod config;
mod cookies;
mod error;
mod id;
mod layer;
mod manager;
mod session;
mod value;

pub use backend::SessionBackend;
pub use codec::{BincodeCodec, JsonCodec, SessionCodec};
pub use config::{DEFAULT_COOKIE_NAME, DEFAULT_KEY_PREFIX, LoadErrorPolicy, MAX_TTL, SessionConfig};
pub use cookies::ResponseCookies;
pub use error::{SessionError, SessionResult};
pub use id::{InvalidSessionId, SessionId};
pub use layer::{SessionLayer, SessionNotBound, SessionService, take_session, try_take_session};
pub use manager::SessionManager;
pub use session::Session;
pub use value::{SessionData, Value};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LoadErrorPolicy, SessionConfig};
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::layer::{SessionLayer, take_session};
    pub use crate::manager::SessionManager;
    pub use crate::session::Session;
    pub use crate::value::Value;
}
