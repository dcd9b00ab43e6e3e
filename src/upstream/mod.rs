//! Upstream (origin) communication.
//!
//! # Data Flow
//! ```text
//! dispatcher miss
//!     → forwarder.rs (build origin + path request, copy method/headers/body)
//!     → reqwest client (connect/request deadlines)
//!     → full body buffered into a CachedResponse
//!     → error.rs classifies failures (construction / transport / body read)
//! ```

pub mod error;
pub mod forwarder;

pub use error::{ForwardError, ForwardErrorKind};
pub use forwarder::{Forward, OriginForwarder};
