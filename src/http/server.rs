//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum router that sends every method and path to the dispatcher
//! - Serve each accepted connection (HTTP/1.1 and HTTP/2) on its own task
//! - Drain connections on shutdown, up to the configured grace period
//! - Log failures writing responses back to clients

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    routing::any,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::cache::{MemoryStore, ResponseStore};
use crate::config::ProxyConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener};
use crate::proxy::Dispatcher;
use crate::upstream::OriginForwarder;

/// Application state injected into handlers.
pub type AppState = Arc<Dispatcher<OriginForwarder>>;

/// HTTP server for the caching proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with an empty cache.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let forwarder = OriginForwarder::new(&config.upstream, &config.limits)?;
        let store: Arc<dyn ResponseStore> =
            Arc::new(MemoryStore::with_capacity(config.cache.initial_capacity));
        let dispatcher = Arc::new(Dispatcher::new(&config, store, forwarder));

        let router = Self::build_router(Arc::clone(&dispatcher));
        Ok(Self {
            router,
            config,
            dispatcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.upstream.normalized_origin(),
            "HTTP server starting"
        );

        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.serve_connection(stream, peer, permit, &tracker)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = tracker.active_count(),
                        "Shutdown signal received, draining connections"
                    );
                    break;
                }
            }
        }

        tracker.begin_drain();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        if tokio::time::timeout(grace, tracker.wait_for_drain()).await.is_err() {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Drain deadline passed, abandoning open connections"
            );
        }

        tracing::info!(
            cached_entries = self.dispatcher.store().len(),
            "HTTP server stopped"
        );
        Ok(())
    }

    /// Serve one connection on its own task.
    fn serve_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        tracker: &ConnectionTracker,
    ) {
        let service = TowerToHyperService::new(self.router.clone());
        let guard = tracker.track();
        let mut drain = tracker.drain_receiver();

        tokio::spawn(async move {
            let _permit = permit;
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = drain.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            // Writing the response back failed (client went away, reset, ...).
            // Any entry stored for the request stays stored.
            if let Err(e) = result {
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer = %peer,
                    error = %e,
                    "Connection ended with error"
                );
            }
            drop(guard);
        });
    }
}

/// Every request goes through the cache.
async fn proxy_handler(
    State(dispatcher): State<AppState>,
    request: Request<Body>,
) -> Response<Body> {
    dispatcher.handle(request).await
}
