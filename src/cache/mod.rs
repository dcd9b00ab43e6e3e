//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → key.rs (origin + path → CacheKey)
//!     → store.rs lookup
//!         hit  → serve stored entry
//!         miss → flight.rs (one fetch per key) → upstream → store.rs put
//! ```

pub mod flight;
pub mod key;
pub mod store;

pub use flight::{Flight, FlightGroup, FlightGuard, FlightWaiter};
pub use key::{derive_key, CacheKey, CacheKeyPolicy};
pub use store::{CachedResponse, MemoryStore, ResponseStore};
