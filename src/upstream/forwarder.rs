//! Origin forwarding.
//!
//! Sends one inbound request to `origin + path` and buffers the full answer.
//! The reqwest response is owned by `forward`, so every early return drops it
//! and hands the connection back to the pool (or closes it).

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method};
use reqwest::redirect::Policy;
use url::Url;

use crate::cache::CachedResponse;
use crate::config::{LimitsConfig, UpstreamConfig};
use crate::http::request::{captured_headers, outbound_headers};
use crate::upstream::error::ForwardError;

/// Something that can fetch a response from the origin.
pub trait Forward: Send + Sync + 'static {
    /// Forward a request for `target` (path and query) and buffer the response.
    fn forward(
        &self,
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Body,
    ) -> impl Future<Output = Result<CachedResponse, ForwardError>> + Send;
}

/// Forwarder backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct OriginForwarder {
    origin: String,
    client: reqwest::Client,
    max_request_body_bytes: usize,
}

impl OriginForwarder {
    /// Build a forwarder for the configured origin.
    pub fn new(upstream: &UpstreamConfig, limits: &LimitsConfig) -> Result<Self, reqwest::Error> {
        let redirect = if upstream.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(upstream.connect_timeout_secs))
            .timeout(Duration::from_secs(upstream.request_timeout_secs))
            .redirect(redirect)
            .build()?;

        Ok(Self {
            origin: upstream.normalized_origin().to_string(),
            client,
            max_request_body_bytes: limits.max_request_body_bytes,
        })
    }

    /// The origin requests are resolved against.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Forward for OriginForwarder {
    async fn forward(
        &self,
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Body,
    ) -> Result<CachedResponse, ForwardError> {
        let url_text = format!("{}{}", self.origin, target);
        let url = Url::parse(&url_text).map_err(|source| ForwardError::InvalidTarget {
            target: url_text.clone(),
            source,
        })?;

        let body = axum::body::to_bytes(body, self.max_request_body_bytes)
            .await
            .map_err(ForwardError::RequestBody)?;

        let mut request = self
            .client
            .request(method, url)
            .headers(outbound_headers(headers));
        // An empty body is left unset so no Content-Length is invented.
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(ForwardError::from_send)?;

        let status = response.status();
        let headers = captured_headers(response.headers().clone());
        let body = response.bytes().await.map_err(ForwardError::from_body)?;

        tracing::trace!(
            url = %url_text,
            status = %status,
            body_bytes = body.len(),
            "Upstream response buffered"
        );

        Ok(CachedResponse::new(status, headers, body))
    }
}
