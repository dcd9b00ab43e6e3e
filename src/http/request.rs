//! Request preparation for forwarding.
//!
//! # Responsibilities
//! - Resolve the upstream target (`origin + path + query`)
//! - Carry inbound headers over unchanged, minus the framing headers the
//!   outbound transport owns
//! - Give every request an id for log correlation
//!
//! # Design Decisions
//! - `Host` comes from the origin URL, not from the client
//! - `Transfer-Encoding` is dropped because the body is re-framed
//! - The request id lives in log fields only; it is never added as a header

use axum::http::{header, HeaderMap, Uri};
use uuid::Uuid;

/// Per-request correlation id for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Path and query of an inbound URI as sent upstream.
pub fn request_target(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}

/// Headers to send upstream for an inbound request.
pub fn outbound_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(header::HOST);
    headers.remove(header::TRANSFER_ENCODING);
    headers
}

/// Headers to keep from an upstream response.
pub fn captured_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(header::TRANSFER_ENCODING);
    headers
}
