//! Single-flight coalescing of concurrent cache misses.
//!
//! # Flow
//! ```text
//! join(key)
//!     → no fetch in flight: Leader (caller fetches, then complete())
//!     → fetch in flight:    Follower (caller awaits the leader's result)
//!
//! Leader dropped without complete():
//!     → followers wake with None and join again
//! ```
//!
//! The map lock is held only inside `join` and `complete`, never across an
//! await.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Registry of in-flight fetches keyed by `K`, each producing a `T`.
#[derive(Debug)]
pub struct FlightGroup<K, T>
where
    K: Eq + Hash,
{
    inflight: DashMap<K, broadcast::Sender<T>>,
}

/// Role assigned by [`FlightGroup::join`].
pub enum Flight<'a, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Caller must perform the fetch and hand the result to the guard.
    Leader(FlightGuard<'a, K, T>),
    /// Another caller is fetching; wait on this.
    Follower(FlightWaiter<T>),
}

impl<K, T> FlightGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Become the leader for `key`, or a follower of the current leader.
    pub fn join(&self, key: &K) -> Flight<'_, K, T> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => Flight::Follower(FlightWaiter {
                rx: entry.get().subscribe(),
            }),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                Flight::Leader(FlightGuard {
                    group: self,
                    key: Some(key.clone()),
                })
            }
        }
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

impl<K, T> Default for FlightGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Leadership of one key. Dropping it without [`complete`](Self::complete)
/// releases the key and wakes followers empty-handed.
pub struct FlightGuard<'a, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    group: &'a FlightGroup<K, T>,
    key: Option<K>,
}

impl<K, T> FlightGuard<'_, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Publish the result to every follower and release the key.
    ///
    /// Returns the number of followers that received it.
    pub fn complete(mut self, value: T) -> usize {
        let Some(key) = self.key.take() else {
            return 0;
        };
        match self.group.inflight.remove(&key) {
            Some((_, tx)) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }
}

impl<K, T> Drop for FlightGuard<'_, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.group.inflight.remove(&key);
        }
    }
}

/// Follower side of a flight.
pub struct FlightWaiter<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> FlightWaiter<T> {
    /// Wait for the leader's result; `None` if the leader gave up.
    pub async fn wait(mut self) -> Option<T> {
        self.rx.recv().await.ok()
    }
}
