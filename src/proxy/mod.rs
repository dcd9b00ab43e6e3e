//! Caching proxy pipeline.
//!
//! # Data Flow
//! ```text
//! http/server.rs handler
//!     → dispatcher.rs
//!         → cache::key (derive)
//!         → cache::store (lookup)
//!         → cache::flight + upstream::forwarder (on miss)
//!         → cache::store (put on success)
//!     → http/response.rs (X-Cache, status, headers, body)
//! ```

pub mod dispatcher;

pub use dispatcher::Dispatcher;
