//! Caching HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌──────────┐    ┌──────────┐    ┌────────────┐
//!     ──────────────────▶│   net    │───▶│   http   │───▶│ dispatcher │
//!                        │ listener │    │  server  │    └─────┬──────┘
//!                        └──────────┘    └──────────┘          │
//!                                                              ▼
//!                                                  ┌──────────────────────┐
//!                                                  │ cache key → store    │
//!                                                  │   hit: replay entry  │
//!                                                  │   miss: single-flight│
//!                                                  └──────────┬───────────┘
//!                                                             │ miss
//!                                                             ▼
//!     Client Response                              ┌──────────────────────┐
//!     ◀──────────────── X-Cache: HIT | MISS ◀──────│ upstream forwarder   │◀──── Origin
//!                                                  └──────────────────────┘
//! ```
//!
//! ```text
//! caching-proxy --port 3000 --origin http://dummyjson.com
//! caching-proxy --config proxy.toml
//! ```

use clap::Parser;

use caching_proxy::cli::Cli;
use caching_proxy::lifecycle;
use caching_proxy::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability);
    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
