//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, server and forwarder produce:
//!     → logging.rs (structured log events, request id in fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (when enabled)
//! ```

pub mod logging;
pub mod metrics;
