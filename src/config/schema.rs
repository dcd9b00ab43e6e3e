//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (host, port, connection limit).
    pub listener: ListenerConfig,

    /// Origin the proxy forwards to.
    pub upstream: UpstreamConfig,

    /// Cache key policy and coalescing.
    pub cache: CacheConfig,

    /// Inbound request limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// The `host:port` pair to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 10_000,
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute base URL every inbound path is resolved against.
    pub origin: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total time allowed for one upstream exchange, body included.
    pub request_timeout_secs: u64,

    /// Follow upstream redirects instead of relaying them.
    pub follow_redirects: bool,
}

impl UpstreamConfig {
    /// Origin without a trailing slash, ready for `origin + path` joins.
    pub fn normalized_origin(&self) -> &str {
        self.origin.trim_end_matches('/')
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "https://google.com".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            follow_redirects: false,
        }
    }
}

/// Cache behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Make the query string part of the cache key.
    pub include_query: bool,

    /// Make the request method part of the cache key.
    pub include_method: bool,

    /// Coalesce concurrent misses for one key into a single origin fetch.
    pub single_flight: bool,

    /// Pre-sized entry capacity of the in-memory store. Not a bound.
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            include_query: false,
            include_method: false,
            single_flight: true,
            initial_capacity: 0,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest inbound body buffered for forwarding, in bytes.
    pub max_request_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Timeout configuration for the server itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long in-flight connections may drain after shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
