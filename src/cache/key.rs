//! Cache key derivation.
//!
//! The base key is the resolved upstream URL: `origin + path`. Query string
//! and method are left out unless the [`CacheKeyPolicy`] opts them in, so by
//! default `/a?x=1` and `POST /a` share the entry of `GET /a`.

use std::fmt;

use axum::http::{Method, Uri};

use crate::config::CacheConfig;

/// Identifier of a cacheable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Derive the key of `path` under `origin`.
///
/// Plain concatenation, so callers pass the origin without a trailing slash.
pub fn derive_key(origin: &str, path: &str) -> CacheKey {
    let mut key = String::with_capacity(origin.len() + path.len());
    key.push_str(origin);
    key.push_str(path);
    CacheKey(key)
}

/// Which parts of a request besides the path feed the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheKeyPolicy {
    pub include_query: bool,
    pub include_method: bool,
}

impl CacheKeyPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            include_query: config.include_query,
            include_method: config.include_method,
        }
    }

    /// Derive the key for an inbound request.
    pub fn derive(&self, origin: &str, method: &Method, uri: &Uri) -> CacheKey {
        let CacheKey(mut url) = derive_key(origin, uri.path());

        if self.include_query {
            if let Some(query) = uri.query() {
                url.push('?');
                url.push_str(query);
            }
        }

        if self.include_method {
            CacheKey(format!("{} {}", method, url))
        } else {
            CacheKey(url)
        }
    }
}
