//! The per-request session record.

use std::sync::Arc;
use tracing::debug;

use crate::cookies::ResponseCookies;
use crate::error::SessionResult;
use crate::id::SessionId;
use crate::manager::Shared;
use crate::value::{SessionData, Value};

/// One client's session state for the lifetime of one request.
///
/// A `Session` is owned by the request that obtained it and is never shared,
/// so it carries no lock. Mutations only touch memory; [`Session::save`] is
/// the single operation that writes to the backend. A session that is never
/// saved leaves the backend untouched.
pub struct Session {
    id: SessionId,
    values: SessionData,
    dirty: bool,
    cleared: bool,
    shared: Arc<Shared>,
    cookies: ResponseCookies,
}

impl Session {
    pub(crate) fn new(id: SessionId, shared: Arc<Shared>, cookies: ResponseCookies) -> Self {
        Self {
            id,
            values: SessionData::new(),
            dirty: false,
            cleared: false,
            shared,
            cookies,
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
        self.dirty = true;
    }

    /// Remove a value, returning it if it was present.
    ///
    /// Marks the session dirty even when the key was absent; the next save
    /// rewrites the whole map.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.dirty = true;
        self.values.remove(key)
    }

    /// Remove every value and delete the backend record on the next save.
    pub fn clear(&mut self) {
        self.values.clear();
        self.cleared = true;
    }

    /// Whether a value was set or deleted since the session was obtained.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether [`Session::clear`] was called.
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the session holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if a key is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The cookies this session writes to.
    pub fn response_cookies(&self) -> &ResponseCookies {
        &self.cookies
    }

    /// Reconcile the session with the backend.
    ///
    /// - Cleared: delete the backend record (a missing record is fine), then
    ///   issue the identifier cookie.
    /// - Otherwise, dirty with at least one value: encode the map, store it
    ///   with the configured TTL, then issue the identifier cookie.
    /// - Otherwise: nothing. This includes a session that was modified but
    ///   ends up empty; its backend record, if any, is left as it was.
    ///
    /// On error no cookie is issued.
    pub async fn save(&self) -> SessionResult<()> {
        let config = &self.shared.config;
        let key = config.session_key(&self.id);

        if self.cleared {
            let existed = self.shared.backend.remove(&key).await?;
            debug!(session_id = %self.id, existed, "Session deleted");
            self.cookies.add(config.session_cookie(&self.id));
            return Ok(());
        }

        if !self.dirty || self.values.is_empty() {
            return Ok(());
        }

        let payload = self.shared.codec.encode(&self.values)?;
        self.shared.backend.store(&key, &payload, config.ttl).await?;
        debug!(
            session_id = %self.id,
            values = self.values.len(),
            bytes = payload.len(),
            "Session saved"
        );
        self.cookies.add(config.session_cookie(&self.id));
        Ok(())
    }

    /// Populate the map from the backend. A missing record leaves it empty.
    pub(crate) async fn load(&mut self) -> SessionResult<()> {
        let key = self.shared.config.session_key(&self.id);
        match self.shared.backend.fetch(&key).await? {
            Some(payload) => {
                self.values = self.shared.codec.decode(&payload)?;
                debug!(session_id = %self.id, values = self.values.len(), "Session loaded");
            }
            None => debug!(session_id = %self.id, "No stored session"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("len", &self.values.len())
            .field("dirty", &self.dirty)
            .field("cleared", &self.cleared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::SessionError;
    use crate::manager::SessionManager;
    use coffer_redis::{MemoryServer, RedisConfig, RedisError, RedisPool};
    use std::time::Duration;

    fn manager(server: &MemoryServer) -> SessionManager {
        manager_with(server, SessionConfig::default())
    }

    fn manager_with(server: &MemoryServer, config: SessionConfig) -> SessionManager {
        let pool = RedisPool::new(server.connector(), config.redis.clone()).unwrap();
        SessionManager::with_backend(config, pool).unwrap()
    }

    fn key(id: &SessionId) -> String {
        format!("c_session:{}", id)
    }

    #[tokio::test]
    async fn test_new_session_is_clean() {
        let server = MemoryServer::new();
        let session = manager(&server).create(ResponseCookies::new());

        assert!(session.is_empty());
        assert!(!session.is_dirty());
        assert!(!session.is_cleared());
        assert_eq!(session.get("missing"), None);
    }

    #[tokio::test]
    async fn test_unmodified_save_does_nothing() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let session = manager.create(cookies.clone());
        session.save().await.unwrap();

        assert_eq!(server.stats().dials, 0);
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_loaded_unmodified_save_does_nothing() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut first = manager.create(ResponseCookies::new());
        first.set("name", "alice");
        first.save().await.unwrap();
        let commands = server.stats().commands;

        let cookies = ResponseCookies::new();
        let second = manager.load(*first.id(), cookies.clone()).await.unwrap();
        second.save().await.unwrap();

        // Only the GET of the load.
        assert_eq!(server.stats().commands, commands + 1);
        assert!(cookies.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_save_load() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.set("k", "v");
        session.set("visits", 3);
        assert!(session.is_dirty());
        session.save().await.unwrap();

        let cookie = cookies.get("session").unwrap();
        assert_eq!(cookie.value(), session.id().to_string());
        assert_eq!(
            server.ttl(0, &key(session.id())),
            Some(Duration::from_secs(3600))
        );

        let loaded = manager
            .load(*session.id(), ResponseCookies::new())
            .await
            .unwrap();
        assert_eq!(loaded.get("k"), Some(&Value::from("v")));
        assert_eq!(loaded.get("visits").and_then(Value::as_i64), Some(3));
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn test_set_then_delete_same_key_skips_persistence() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.set("k", "v");
        assert_eq!(session.delete("k"), Some(Value::from("v")));
        assert!(session.is_dirty());
        session.save().await.unwrap();

        assert_eq!(server.stats().dials, 0);
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_emptied_session_keeps_backend_record() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut first = manager.create(ResponseCookies::new());
        first.set("k", "v");
        first.save().await.unwrap();

        let mut second = manager
            .load(*first.id(), ResponseCookies::new())
            .await
            .unwrap();
        second.delete("k");
        second.save().await.unwrap();

        assert!(server.contains(0, &key(first.id())));
    }

    #[tokio::test]
    async fn test_delete_rewrites_whole_map() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut first = manager.create(ResponseCookies::new());
        first.set("a", 1);
        first.set("b", 2);
        first.save().await.unwrap();

        let mut second = manager
            .load(*first.id(), ResponseCookies::new())
            .await
            .unwrap();
        assert_eq!(second.delete("missing"), None);
        assert!(second.is_dirty());
        second.delete("a");
        second.save().await.unwrap();

        let third = manager
            .load(*first.id(), ResponseCookies::new())
            .await
            .unwrap();
        assert!(!third.contains_key("a"));
        assert_eq!(third.get("b"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_clear_deletes_record() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut first = manager.create(ResponseCookies::new());
        first.set("k", "v");
        first.save().await.unwrap();
        assert!(server.contains(0, &key(first.id())));

        let cookies = ResponseCookies::new();
        let mut second = manager.load(*first.id(), cookies.clone()).await.unwrap();
        second.clear();
        assert!(second.is_cleared());
        assert!(!second.is_dirty());
        second.save().await.unwrap();

        assert!(!server.contains(0, &key(first.id())));
        let cookie = cookies.get("session").unwrap();
        assert_eq!(cookie.value(), first.id().to_string());

        let third = manager
            .load(*first.id(), ResponseCookies::new())
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_clear_wins_over_later_set() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut session = manager.create(ResponseCookies::new());
        session.clear();
        session.set("k", "v");
        session.save().await.unwrap();

        assert!(server.is_empty());
    }

    #[tokio::test]
    async fn test_clear_of_missing_record_succeeds() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.clear();
        session.save().await.unwrap();

        assert!(cookies.get("session").is_some());
    }

    #[tokio::test]
    async fn test_failed_delete_sets_no_cookie() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.clear();
        server.go_offline();

        let err = session.save().await.unwrap_err();
        assert!(err.is_connectivity_error());
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_sets_no_cookie() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.set("k", "v");
        server.go_offline();

        assert!(session.save().await.is_err());
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_unencodable_value_fails_save_without_write() {
        let server = MemoryServer::new();
        let manager = manager(&server).with_codec(crate::codec::JsonCodec);
        let cookies = ResponseCookies::new();

        let mut session = manager.create(cookies.clone());
        session.set("score", f64::INFINITY);
        let err = session.save().await.unwrap_err();

        assert!(matches!(err, SessionError::Serialization(_)));
        assert!(server.is_empty());
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_from_save() {
        let server = MemoryServer::with_password("abc123");
        let config = SessionConfig::default()
            .with_redis(RedisConfig::builder().password("wrong").build());
        let manager = manager_with(&server, config);

        let mut session = manager.create(ResponseCookies::new());
        session.set("k", "v");
        let err = session.save().await.unwrap_err();
        assert!(matches!(err, SessionError::Backend(RedisError::Auth(_))));
    }

    #[tokio::test]
    async fn test_corrupt_record_fails_load() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let id = SessionId::random();
        server.insert_raw(0, &key(&id), b"\x05garbage".to_vec());

        let err = manager
            .load(id, ResponseCookies::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Deserialization(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_refreshes_ttl() {
        let server = MemoryServer::new();
        let manager = manager(&server);

        let mut session = manager.create(ResponseCookies::new());
        session.set("k", "v");
        session.save().await.unwrap();

        tokio::time::advance(Duration::from_secs(3000)).await;
        session.set("k", "w");
        session.save().await.unwrap();

        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(
            server.ttl(0, &key(session.id())),
            Some(Duration::from_secs(600))
        );
    }

    #[tokio::test]
    async fn test_accessors() {
        let server = MemoryServer::new();
        let mut session = manager(&server).create(ResponseCookies::new());
        session.set("a", true);
        session.set("b", 1.5);

        let mut keys: Vec<&str> = session.keys().collect();
        keys.sort();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(session.len(), 2);
        assert!(session.contains_key("a"));
        assert!(!format!("{:?}", session).contains("1.5"));
    }
}
