//! Response construction for the client.
//!
//! # Responsibilities
//! - Replay a cached (or freshly fetched) upstream response verbatim
//! - Stamp the `X-Cache` header exactly once
//! - Map forwarding failures to a plain 500
//!
//! # Design Decisions
//! - `X-Cache` is inserted, not appended, so an upstream `X-Cache` never
//!   shows up twice
//! - Failure bodies are short and fixed; details stay in the logs

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

use crate::cache::CachedResponse;
use crate::upstream::{ForwardError, ForwardErrorKind};

/// Header telling the client whether the store answered.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Whether a response came from the store or from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }

    fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// Build the client response for a stored entry.
pub fn cached_response(entry: &CachedResponse, status: CacheStatus) -> Response<Body> {
    let mut response = Response::new(Body::from(entry.body.clone()));
    *response.status_mut() = entry.status;
    *response.headers_mut() = entry.headers.clone();
    response
        .headers_mut()
        .insert(X_CACHE, status.header_value());
    response
}

/// Build the 500 sent when the origin could not be reached or read.
pub fn forward_error_response(err: &ForwardError) -> Response<Body> {
    let message = match err.kind() {
        ForwardErrorKind::RequestConstruction => "Failed to create request",
        ForwardErrorKind::Transport => "Failed to forward request",
        ForwardErrorKind::BodyRead => "Failed to read response body",
    };

    let mut response = Response::new(Body::from(message));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CACHE, CacheStatus::Miss.header_value());
    response
}
