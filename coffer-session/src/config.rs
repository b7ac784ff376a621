//! Session configuration.

use coffer_redis::RedisConfig;
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::id::SessionId;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Default backend key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "c_session:";

/// Longest accepted session TTL (about 68 years).
pub const MAX_TTL: Duration = Duration::from_secs(i32::MAX as u64);

/// What the request binding does when an existing session cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorPolicy {
    /// Log the error and continue with a fresh, empty session.
    ///
    /// An unreachable backend looks like a new visitor to the handler.
    #[default]
    StartFresh,
    /// Log the error and answer `500 Internal Server Error` without calling
    /// the handler.
    Reject,
}

/// Session configuration.
///
/// Every field has a default, so a partial TOML document or environment is
/// enough to build a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend connection and pool settings.
    pub redis: RedisConfig,
    /// Prefix of every backend key; the identifier is appended verbatim.
    pub key_prefix: String,
    /// Name of the identifier cookie.
    pub cookie_name: String,
    /// Cookie `Domain` attribute.
    pub cookie_domain: Option<String>,
    /// Cookie `Path` attribute.
    pub cookie_path: String,
    /// Lifetime of the backend record and the cookie's `Max-Age`, refreshed on
    /// every save.
    #[serde(with = "coffer_redis::seconds")]
    pub ttl: Duration,
    /// Cookie `HttpOnly` flag.
    pub http_only: bool,
    /// Cookie `Secure` flag.
    pub secure: bool,
    /// Behavior when loading an existing session fails.
    pub on_load_error: LoadErrorPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            ttl: Duration::from_secs(3600), // 1 hour
            http_only: true,
            secure: false,
            on_load_error: LoadErrorPolicy::StartFresh,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given backend.
    pub fn new(redis: RedisConfig) -> Self {
        Self {
            redis,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Backend settings come from the `REDIS_*` variables, session settings
    /// from `SESSION_KEY_PREFIX`, `SESSION_COOKIE_NAME`,
    /// `SESSION_COOKIE_DOMAIN`, `SESSION_COOKIE_PATH`, `SESSION_TTL` (seconds),
    /// `SESSION_HTTP_ONLY`, `SESSION_SECURE` and `SESSION_ON_LOAD_ERROR`
    /// (`start_fresh` or `reject`). Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::new(RedisConfig::from_env().build());

        if let Ok(prefix) = std::env::var("SESSION_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Ok(name) = std::env::var("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Ok(domain) = std::env::var("SESSION_COOKIE_DOMAIN")
            && !domain.is_empty()
        {
            config.cookie_domain = Some(domain);
        }

        if let Ok(path) = std::env::var("SESSION_COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Ok(ttl) = std::env::var("SESSION_TTL")
            && let Ok(secs) = ttl.parse()
        {
            config.ttl = Duration::from_secs(secs);
        }

        if let Ok(flag) = std::env::var("SESSION_HTTP_ONLY")
            && let Some(flag) = parse_flag(&flag)
        {
            config.http_only = flag;
        }

        if let Ok(flag) = std::env::var("SESSION_SECURE")
            && let Some(flag) = parse_flag(&flag)
        {
            config.secure = flag;
        }

        if let Ok(policy) = std::env::var("SESSION_ON_LOAD_ERROR") {
            match policy.trim().to_ascii_lowercase().as_str() {
                "start_fresh" => config.on_load_error = LoadErrorPolicy::StartFresh,
                "reject" => config.on_load_error = LoadErrorPolicy::Reject,
                _ => {}
            }
        }

        config
    }

    /// Parse and validate a TOML document.
    ///
    /// ```
    /// use coffer_session::SessionConfig;
    ///
    /// let config = SessionConfig::from_toml(r#"
    ///     cookie_name = "sid"
    ///     ttl = 1800
    ///
    ///     [redis]
    ///     address = "10.0.0.5:6379"
    ///     database = 2
    /// "#).unwrap();
    ///
    /// assert_eq!(config.cookie_name, "sid");
    /// assert_eq!(config.redis.database, 2);
    /// assert_eq!(config.key_prefix, "c_session:");
    /// ```
    pub fn from_toml(source: &str) -> SessionResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the backend configuration.
    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    /// Set the backend key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie domain.
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the cookie path.
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the session TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the `HttpOnly` flag.
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `Secure` flag.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the load error policy.
    pub fn with_load_error_policy(mut self, policy: LoadErrorPolicy) -> Self {
        self.on_load_error = policy;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> SessionResult<()> {
        if self.cookie_name.is_empty() || !self.cookie_name.bytes().all(is_token_byte) {
            return Err(SessionError::Config(format!(
                "cookie name {:?} is not a valid cookie token",
                self.cookie_name
            )));
        }
        if self.ttl.as_secs() == 0 {
            return Err(SessionError::Config(
                "ttl must be at least one second".to_string(),
            ));
        }
        if self.ttl > MAX_TTL {
            return Err(SessionError::Config(format!(
                "ttl must not exceed {} seconds",
                MAX_TTL.as_secs()
            )));
        }
        self.redis.validate()?;
        Ok(())
    }

    /// Build the backend key for a session.
    pub fn session_key(&self, id: &SessionId) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Build the identifier cookie issued on save.
    pub fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        let max_age = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let mut builder = Cookie::build((self.cookie_name.clone(), id.to_string()))
            .path(self.cookie_path.clone())
            .max_age(cookie::time::Duration::seconds(max_age))
            .http_only(self.http_only)
            .secure(self.secure);

        if let Some(domain) = &self.cookie_domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }
}

/// RFC 6265 `token`: visible ASCII except separators.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookie::time::Duration as CookieDuration;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "session");
        assert_eq!(config.key_prefix, "c_session:");
        assert_eq!(config.cookie_path, "/");
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert!(config.http_only);
        assert!(!config.secure);
        assert_eq!(config.on_load_error, LoadErrorPolicy::StartFresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_key() {
        let config = SessionConfig::default().with_key_prefix("app:");
        let id: SessionId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(
            config.session_key(&id),
            "app:67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = SessionConfig::default()
            .with_cookie_name("sid")
            .with_cookie_domain("example.com")
            .with_cookie_path("/app")
            .with_ttl(Duration::from_secs(1800))
            .with_secure(true);
        let id = SessionId::random();

        let cookie = config.session_cookie(&id);
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some("/app"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(1800)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_cookie_without_domain() {
        let cookie = SessionConfig::default().session_cookie(&SessionId::random());
        assert_eq!(cookie.domain(), None);
        assert!(!cookie.to_string().contains("Domain"));
    }

    #[test]
    fn test_validate_cookie_name() {
        for bad in ["", "my session", "a;b", "sess=ion"] {
            let config = SessionConfig::default().with_cookie_name(bad);
            assert!(
                matches!(config.validate(), Err(SessionError::Config(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(
            SessionConfig::default()
                .with_cookie_name("__Host-sid")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_ttl() {
        let config = SessionConfig::default().with_ttl(Duration::from_millis(500));
        assert!(config.validate().is_err());

        assert!(SessionConfig::default().with_ttl(MAX_TTL).validate().is_ok());
        let config = SessionConfig::default().with_ttl(MAX_TTL + Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_from_toml_rejects_huge_ttl() {
        let err = SessionConfig::from_toml("ttl = 9223372036854775807").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn test_validate_backend() {
        let config = SessionConfig::new(RedisConfig::new(""));
        assert!(matches!(
            config.validate(),
            Err(SessionError::Backend(coffer_redis::RedisError::Config(_)))
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = SessionConfig::from_toml(
            r#"
            key_prefix = "shop:"
            secure = true
            ttl = 1800
            on_load_error = "reject"

            [redis]
            password = "abc123"
            max_idle = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.key_prefix, "shop:");
        assert!(config.secure);
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert_eq!(config.on_load_error, LoadErrorPolicy::Reject);
        assert_eq!(config.redis.password.as_deref(), Some("abc123"));
        assert_eq!(config.redis.max_idle, 2);
        assert_eq!(config.redis.address, "127.0.0.1:6379");
        assert_eq!(config.cookie_name, "session");
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        assert!(SessionConfig::from_toml("ttl = 0").is_err());
        assert!(SessionConfig::from_toml("ttl = \"soon\"").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
