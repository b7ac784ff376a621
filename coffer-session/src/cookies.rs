use cookie::Cookie;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cookies to be sent with the response of the current request.
///
/// A session writes its identifier cookie here when it is saved; the request
/// binding turns the collected cookies into `Set-Cookie` headers once the
/// handler returns. Clones share the same cookies.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    cookies: Arc<Mutex<Vec<Cookie<'static>>>>,
}

impl ResponseCookies {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie, replacing any earlier cookie with the same name.
    pub fn add(&self, cookie: Cookie<'static>) {
        let mut cookies = self.cookies.lock();
        cookies.retain(|c| c.name() != cookie.name());
        cookies.push(cookie);
    }

    /// Get a copy of the cookie with the given name.
    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies.lock().iter().find(|c| c.name() == name).cloned()
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    /// Whether no cookie has been added.
    pub fn is_empty(&self) -> bool {
        self.cookies.lock().is_empty()
    }

    /// Remove and return all cookies.
    pub fn take(&self) -> Vec<Cookie<'static>> {
        std::mem::take(&mut *self.cookies.lock())
    }
}
