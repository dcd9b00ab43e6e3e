//! In-memory response store.
//!
//! # Design Decisions
//! - Entries are `Arc<CachedResponse>` and are only ever swapped whole, so a
//!   reader holds either the old entry or the new one
//! - `DashMap` shards the lock; a shard is held for the point read or write
//!   only, never across an await
//! - No eviction: the store grows for the life of the process

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use dashmap::DashMap;

use crate::cache::key::CacheKey;

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Storage backend for cached responses.
///
/// Implementations must make `get` and `put` atomic per key. This is the seam
/// for bounded or expiring stores.
pub trait ResponseStore: Send + Sync {
    /// Look up an entry.
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResponse>>;

    /// Insert or replace an entry.
    fn put(&self, key: CacheKey, response: Arc<CachedResponse>);

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, Arc<CachedResponse>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store pre-sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
        }
    }
}

impl ResponseStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResponse>> {
        self.entries.get(key).map(|r| Arc::clone(r.value()))
    }

    fn put(&self, key: CacheKey, response: Arc<CachedResponse>) {
        self.entries.insert(key, response);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
