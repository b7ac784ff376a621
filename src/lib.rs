// Coffer - server-side cookie sessions persisted in Redis
//
// This library ties together a pooled Redis backend, a session record with
// dirty tracking and conditional save, and a tower layer binding one session
// to every request.

// Re-export session functionality
pub use coffer_session::*;

// Re-export member crates
pub use coffer_log;
pub use coffer_redis;

pub use coffer_redis::{MemoryServer, RedisConfig, RedisError, RedisPool};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        LoadErrorPolicy,
        MemoryServer,
        RedisConfig,
        RedisPool,
        ResponseCookies,
        Session,
        SessionConfig,
        SessionError,
        SessionLayer,
        SessionManager,
        Value,
        take_session,
    };
}
