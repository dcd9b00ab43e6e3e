//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, hyper connection, drain)
//!     → proxy::Dispatcher (cache lookup / forward)
//!         → request.rs (target, headers sent upstream)
//!     → response.rs (stored entry + X-Cache, or 500)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::RequestId;
pub use response::{CacheStatus, X_CACHE};
pub use server::HttpServer;
