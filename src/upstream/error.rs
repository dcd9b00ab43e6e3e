//! Errors raised while forwarding to the origin.

use thiserror::Error;

/// Broad class of a forwarding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardErrorKind {
    /// The outbound request could not be built.
    RequestConstruction,
    /// Connecting to or exchanging with the origin failed.
    Transport,
    /// The origin's response body could not be fully read.
    BodyRead,
}

impl ForwardErrorKind {
    /// Metric label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardErrorKind::RequestConstruction => "request_construction",
            ForwardErrorKind::Transport => "transport",
            ForwardErrorKind::BodyRead => "body_read",
        }
    }
}

/// Errors that can occur while forwarding a request to the origin.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// `origin + path` did not form a valid URL.
    #[error("invalid upstream target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    /// The inbound body could not be buffered for forwarding.
    #[error("failed to read inbound request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// The origin did not answer within the configured deadline.
    #[error("upstream request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Connection, TLS or protocol failure talking to the origin.
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response started but its body could not be drained.
    #[error("failed to read upstream response body: {0}")]
    BodyRead(#[source] reqwest::Error),
}

impl ForwardError {
    pub fn kind(&self) -> ForwardErrorKind {
        match self {
            ForwardError::InvalidTarget { .. } | ForwardError::RequestBody(_) => {
                ForwardErrorKind::RequestConstruction
            }
            ForwardError::Timeout(_) | ForwardError::Transport(_) => ForwardErrorKind::Transport,
            ForwardError::BodyRead(_) => ForwardErrorKind::BodyRead,
        }
    }

    /// Classify an error from sending the request.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout(err)
        } else {
            ForwardError::Transport(err)
        }
    }

    /// Classify an error from draining the response body.
    pub(crate) fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout(err)
        } else {
            ForwardError::BodyRead(err)
        }
    }
}
