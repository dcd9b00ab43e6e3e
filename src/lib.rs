//! Caching HTTP proxy library.
//!
//! Every inbound request is resolved against one configured origin. The first
//! request for a URL is forwarded and its full response kept in memory; later
//! requests for the same URL are answered from memory with `X-Cache: HIT`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::Dispatcher;
