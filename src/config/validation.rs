//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! reported, not just the first one.

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `upstream.origin`).
    pub field: &'static str,
    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_origin(&config.upstream.origin, &mut errors);

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than 0",
        ));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.connect_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_origin(origin: &str, errors: &mut Vec<ValidationError>) {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            errors.push(ValidationError::new(
                "upstream.origin",
                format!("'{}' is not an absolute URL: {}", origin, e),
            ));
            return;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        errors.push(ValidationError::new(
            "upstream.origin",
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        errors.push(ValidationError::new("upstream.origin", "missing host"));
    }
    // Paths are appended verbatim, so anything after the path would end up mid-URL.
    if url.query().is_some() || url.fragment().is_some() {
        errors.push(ValidationError::new(
            "upstream.origin",
            "must not carry a query or fragment",
        ));
    }
}
