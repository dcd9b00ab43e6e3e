//! Startup orchestration.
//!
//! # Order
//! validate config → metrics endpoint → upstream client → bind listener →
//! signal watcher → serve. Any failure before serving is fatal.

use std::net::{AddrParseError, SocketAddr};

use thiserror::Error;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Start the proxy and serve until SIGINT/SIGTERM.
pub async fn start(config: ProxyConfig) -> Result<(), StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        origin = %config.upstream.normalized_origin(),
        max_connections = config.listener.max_connections,
        single_flight = config.cache.single_flight,
        key_includes_query = config.cache.include_query,
        key_includes_method = config.cache.include_method,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config.clone())?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;
    Ok(())
}
