//! Request binding for tower services.
//!
//! [`SessionLayer`] resolves a [`Session`] for every request before the inner
//! service runs, and turns the cookies the session issued into `Set-Cookie`
//! headers after it returns.

use cookie::Cookie;
use futures::future::BoxFuture;
use http::header::{COOKIE, SET_COOKIE};
use http::{Extensions, HeaderMap, HeaderValue, Request, Response, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{error, warn};

use crate::config::LoadErrorPolicy;
use crate::cookies::ResponseCookies;
use crate::manager::SessionManager;
use crate::session::Session;

// ============================================================================
// Request Extension
// ============================================================================

/// Request extension carrying the session until a handler takes it.
#[derive(Clone)]
struct SessionSlot(Arc<Mutex<Option<Session>>>);

/// Take the session bound to a request.
///
/// # Panics
///
/// Panics if the request did not pass through [`SessionLayer`], or if the
/// session was already taken. Both are programming errors.
pub fn take_session(extensions: &mut Extensions) -> Session {
    match try_take_session(extensions) {
        Some(session) => session,
        None => panic!(
            "no session bound to this request: install SessionLayer in front of the handler \
             and take the session only once"
        ),
    }
}

/// Take the session bound to a request, if there is one.
pub fn try_take_session(extensions: &mut Extensions) -> Option<Session> {
    extensions
        .get::<SessionSlot>()
        .and_then(|slot| slot.0.lock().take())
}

/// The session was requested but no [`SessionLayer`] bound one.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("No session is bound to this request; is SessionLayer installed?")]
pub struct SessionNotBound;

// ============================================================================
// Tower Layer
// ============================================================================

/// Layer binding a session to every request.
#[derive(Clone, Debug)]
pub struct SessionLayer {
    manager: SessionManager,
}

impl SessionLayer {
    /// Create a new layer.
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Service created by [`SessionLayer`].
#[derive(Clone, Debug)]
pub struct SessionService<S> {
    inner: S,
    manager: SessionManager,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // The clone is not ready; swap it in and drive the one that is.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let manager = self.manager.clone();

        Box::pin(async move {
            let config = manager.config();
            let incoming = read_cookie(req.headers(), &config.cookie_name);
            let cookies = ResponseCookies::new();

            let session = match manager.resolve(incoming.as_deref(), cookies.clone()).await {
                Ok(session) => session,
                Err(e) => match config.on_load_error {
                    LoadErrorPolicy::StartFresh => {
                        error!(error = %e, "Failed to load session, starting a fresh one");
                        manager.create(cookies.clone())
                    }
                    LoadErrorPolicy::Reject => {
                        error!(error = %e, "Failed to load session, rejecting request");
                        let mut response = Response::new(ResBody::default());
                        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                        return Ok(response);
                    }
                },
            };

            req.extensions_mut()
                .insert(SessionSlot(Arc::new(Mutex::new(Some(session)))));

            let mut response = inner.call(req).await?;

            for cookie in cookies.take() {
                match HeaderValue::from_str(&cookie.to_string()) {
                    Ok(value) => {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                    Err(e) => warn!(error = %e, cookie = cookie.name(), "Dropping unencodable cookie"),
                }
            }

            Ok(response)
        })
    }
}

/// First value of the named cookie across all `Cookie` headers.
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

// ============================================================================
// Axum Extractor
// ============================================================================

#[cfg(feature = "axum")]
mod extract {
    use axum::extract::FromRequestParts;
    use axum::response::{IntoResponse, Response};
    use http::StatusCode;
    use http::request::Parts;
    use tracing::error;

    use super::{SessionNotBound, try_take_session};
    use crate::session::Session;

    impl<S: Send + Sync> FromRequestParts<S> for Session {
        type Rejection = SessionNotBound;

        async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
            try_take_session(&mut parts.extensions).ok_or(SessionNotBound)
        }
    }

    impl IntoResponse for SessionNotBound {
        fn into_response(self) -> Response {
            error!("{}", self);
            (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; session=abc"));
        headers.append(COOKIE, HeaderValue::from_static("session=later"));

        assert_eq!(read_cookie(&headers, "session").as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_read_cookie_skips_malformed_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("garbage; session=abc"));
        assert_eq!(read_cookie(&headers, "session").as_deref(), Some("abc"));
    }

    #[test]
    fn test_try_take_without_layer() {
        let mut extensions = Extensions::new();
        assert!(try_take_session(&mut extensions).is_none());
    }

    #[test]
    #[should_panic(expected = "no session bound to this request")]
    fn test_take_without_layer_panics() {
        let mut extensions = Extensions::new();
        take_session(&mut extensions);
    }
}
