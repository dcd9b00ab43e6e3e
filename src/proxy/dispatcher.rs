//! Per-request orchestration: key → lookup → (hit | fetch → store) → respond.
//!
//! # Request States
//! ```text
//! Received → KeyDerived → CacheHit → Served
//!                       → CacheMiss → Forwarding → ForwardSucceeded → Stored → Served
//!                                               → ForwardFailed → ErrorReported
//! ```
//!
//! A failed fetch never touches the store. The store is only locked for the
//! lookup and the write, never while the origin is being contacted.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, Response};

use crate::cache::{CacheKey, CacheKeyPolicy, CachedResponse, Flight, FlightGroup, ResponseStore};
use crate::config::ProxyConfig;
use crate::http::request::{request_target, RequestId};
use crate::http::response::{cached_response, forward_error_response, CacheStatus};
use crate::observability::metrics;
use crate::upstream::{Forward, ForwardError, OriginForwarder};

/// Outcome shared between a single-flight leader and its followers.
type FetchResult = Result<Arc<CachedResponse>, Arc<ForwardError>>;

/// Routes every inbound request through the cache.
pub struct Dispatcher<F = OriginForwarder> {
    origin: String,
    key_policy: CacheKeyPolicy,
    store: Arc<dyn ResponseStore>,
    flights: Option<FlightGroup<CacheKey, FetchResult>>,
    forwarder: F,
}

impl<F: Forward> Dispatcher<F> {
    /// Wire a dispatcher from config, a store and a forwarder.
    pub fn new(config: &ProxyConfig, store: Arc<dyn ResponseStore>, forwarder: F) -> Self {
        Self {
            origin: config.upstream.normalized_origin().to_string(),
            key_policy: CacheKeyPolicy::from_config(&config.cache),
            store,
            flights: config.cache.single_flight.then(FlightGroup::new),
            forwarder,
        }
    }

    /// The store this dispatcher reads and fills.
    pub fn store(&self) -> &Arc<dyn ResponseStore> {
        &self.store
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let request_id = RequestId::new();
        let method = request.method().clone();
        let key = self
            .key_policy
            .derive(&self.origin, request.method(), request.uri());

        if let Some(entry) = self.store.get(&key) {
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                key = %key,
                "Cache hit"
            );
            metrics::record_cache_lookup(CacheStatus::Hit);
            let response = cached_response(&entry, CacheStatus::Hit);
            let status = response.status().as_u16();
            metrics::record_request(&method, status, CacheStatus::Hit, start);
            return response;
        }

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            key = %key,
            "Cache miss, forwarding to origin"
        );
        metrics::record_cache_lookup(CacheStatus::Miss);

        let fetched = if self.is_storable(&method) {
            self.fetch(&key, request).await
        } else {
            self.forward_uncached(request)
                .await
                .map(|entry| (entry, CacheStatus::Miss))
        };

        let (response, cache_status) = match fetched {
            Ok((entry, cache_status)) => (cached_response(&entry, cache_status), cache_status),
            Err(err) => {
                tracing::warn!(
                    request_id = %request_id,
                    key = %key,
                    kind = err.kind().as_str(),
                    error = %err,
                    "Upstream request failed"
                );
                (forward_error_response(&err), CacheStatus::Miss)
            }
        };

        let status = response.status().as_u16();
        metrics::record_request(&method, status, cache_status, start);
        response
    }

    /// Obtain the response for a missed key, coalescing concurrent misses.
    async fn fetch(
        &self,
        key: &CacheKey,
        request: Request<Body>,
    ) -> Result<(Arc<CachedResponse>, CacheStatus), Arc<ForwardError>> {
        let Some(flights) = &self.flights else {
            return self
                .forward_and_store(key, request)
                .await
                .map(|entry| (entry, CacheStatus::Miss));
        };

        loop {
            match flights.join(key) {
                Flight::Leader(guard) => {
                    // A fetch may have finished between our lookup and join.
                    if let Some(entry) = self.store.get(key) {
                        guard.complete(Ok(Arc::clone(&entry)));
                        return Ok((entry, CacheStatus::Hit));
                    }

                    let result = self.forward_and_store(key, request).await;
                    let waiters = guard.complete(result.clone());
                    if waiters > 0 {
                        tracing::debug!(key = %key, waiters, "Shared upstream response");
                    }
                    return result.map(|entry| (entry, CacheStatus::Miss));
                }
                Flight::Follower(waiter) => {
                    metrics::record_single_flight_wait();
                    if let Some(result) = waiter.wait().await {
                        return result.map(|entry| (entry, CacheStatus::Miss));
                    }
                    tracing::debug!(key = %key, "In-flight fetch abandoned, retrying lookup");
                }
            }
        }
    }

    /// Whether a response to `method` may be written under its key.
    ///
    /// A HEAD response has no body. When the key ignores the method it would
    /// overwrite the entry GET requests replay.
    fn is_storable(&self, method: &Method) -> bool {
        self.key_policy.include_method || *method != Method::HEAD
    }

    /// Forward to the origin and, on success, replace the stored entry.
    async fn forward_and_store(&self, key: &CacheKey, request: Request<Body>) -> FetchResult {
        let entry = self.forward_uncached(request).await?;
        self.store.put(key.clone(), Arc::clone(&entry));
        metrics::record_cache_size(self.store.len());
        tracing::debug!(key = %key, status = %entry.status, "Stored upstream response");
        Ok(entry)
    }

    async fn forward_uncached(&self, request: Request<Body>) -> FetchResult {
        let (parts, body) = request.into_parts();
        let target = request_target(&parts.uri);

        self.forwarder
            .forward(parts.method, target, parts.headers, body)
            .await
            .map(Arc::new)
            .map_err(|err| {
                metrics::record_upstream_error(err.kind());
                Arc::new(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::CacheConfig;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Origin double that counts calls and can be switched to failing.
    #[derive(Default)]
    struct MockOrigin {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
        seen: Mutex<Vec<(Method, String, HeaderMap, Bytes)>>,
    }

    impl MockOrigin {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Forward for Arc<MockOrigin> {
        async fn forward(
            &self,
            method: Method,
            target: &str,
            headers: HeaderMap,
            body: Body,
        ) -> Result<CachedResponse, ForwardError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            self.seen
                .lock()
                .unwrap()
                .push((method, target.to_string(), headers, body));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ForwardError::InvalidTarget {
                    target: target.to_string(),
                    source: url::ParseError::EmptyHost,
                });
            }

            let mut headers = HeaderMap::new();
            headers.insert("content-type", HeaderValue::from_static("text/plain"));
            headers.append("x-upstream", HeaderValue::from_static("a"));
            headers.append("x-upstream", HeaderValue::from_static("b"));
            headers.insert("x-call", HeaderValue::from(call));
            Ok(CachedResponse::new(
                StatusCode::OK,
                headers,
                format!("{} {}", target, call),
            ))
        }
    }

    fn config(cache: CacheConfig) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.origin = "http://example.test/".into();
        config.cache = cache;
        config
    }

    fn dispatcher(
        cache: CacheConfig,
        origin: Arc<MockOrigin>,
    ) -> (Dispatcher<Arc<MockOrigin>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(&config(cache), store.clone(), origin);
        (dispatcher, store)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let origin = Arc::new(MockOrigin::default());
        let (dispatcher, store) = dispatcher(CacheConfig::default(), origin.clone());

        let first = dispatcher.handle(get("/x")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-cache"], "MISS");
        assert_eq!(text(first).await, "/x 1");

        let second = dispatcher.handle(get("/x")).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()["x-cache"], "HIT");
        assert_eq!(text(second).await, "/x 1");

        assert_eq!(origin.calls(), 1);
        assert!(store
            .get(&CacheKey::from("http://example.test/x"))
            .is_some());
    }

    #[tokio::test]
    async fn hit_replays_headers_verbatim() {
        let origin = Arc::new(MockOrigin::default());
        let (dispatcher, _) = dispatcher(CacheConfig::default(), origin.clone());

        let miss = dispatcher.handle(get("/h")).await;
        let hit = dispatcher.handle(get("/h")).await;

        for name in ["content-type", "x-upstream", "x-call"] {
            let on_miss: Vec<_> = miss.headers().get_all(name).iter().collect();
            let on_hit: Vec<_> = hit.headers().get_all(name).iter().collect();
            assert_eq!(on_miss, on_hit, "header {} differs", name);
        }
        assert_eq!(hit.headers().get_all("x-cache").iter().count(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let origin = Arc::new(MockOrigin::default());
        origin.failing.store(true, Ordering::SeqCst);
        let (dispatcher, store) = dispatcher(CacheConfig::default(), origin.clone());

        let failed = dispatcher.handle(get("/y")).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.headers()["x-cache"], "MISS");
        assert!(store.is_empty());

        origin.failing.store(false, Ordering::SeqCst);
        let recovered = dispatcher.handle(get("/y")).await;
        assert_eq!(recovered.status(), StatusCode::OK);
        assert_eq!(recovered.headers()["x-cache"], "MISS");
        assert_eq!(origin.calls(), 2);
    }

    #[tokio::test]
    async fn forwards_method_target_headers_and_body() {
        let origin = Arc::new(MockOrigin::default());
        let (dispatcher, _) = dispatcher(CacheConfig::default(), origin.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit?draft=1")
            .header("authorization", "Bearer t")
            .body(Body::from("payload"))
            .unwrap();
        dispatcher.handle(request).await;

        let seen = origin.seen.lock().unwrap();
        let (method, target, headers, body) = &seen[0];
        assert_eq!(*method, Method::POST);
        assert_eq!(target, "/submit?draft=1");
        assert_eq!(headers["authorization"], "Bearer t");
        assert_eq!(body, &Bytes::from("payload"));
    }

    #[tokio::test]
    async fn default_policy_shares_entry_across_query_and_method() {
        let origin = Arc::new(MockOrigin::default());
        let (dispatcher, _) = dispatcher(CacheConfig::default(), origin.clone());

        dispatcher.handle(get("/q?page=1")).await;
        let other_query = dispatcher.handle(get("/q?page=2")).await;
        let head = dispatcher.handle(head("/q")).await;

        assert_eq!(other_query.headers()["x-cache"], "HIT");
        assert_eq!(head.headers()["x-cache"], "HIT");
        assert_eq!(origin.calls(), 1);
    }

    fn head(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::HEAD)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn head_miss_leaves_get_entry_unwritten() {
        let origin = Arc::new(MockOrigin::default());
        let (dispatcher, store) = dispatcher(CacheConfig::default(), origin.clone());

        let head = dispatcher.handle(head("/z")).await;
        assert_eq!(head.headers()["x-cache"], "MISS");
        assert!(store.is_empty());

        let first = dispatcher.handle(get("/z")).await;
        assert_eq!(first.headers()["x-cache"], "MISS");
        assert_eq!(text(first).await, "/z 2");

        let second = dispatcher.handle(get("/z")).await;
        assert_eq!(second.headers()["x-cache"], "HIT");
        assert_eq!(text(second).await, "/z 2");
        assert_eq!(origin.calls(), 2);
    }

    #[tokio::test]
    async fn head_is_stored_under_its_own_key_when_method_is_keyed() {
        let origin = Arc::new(MockOrigin::default());
        let cache = CacheConfig {
            include_method: true,
            ..CacheConfig::default()
        };
        let (dispatcher, store) = dispatcher(cache, origin.clone());

        dispatcher.handle(head("/z")).await;
        let again = dispatcher.handle(head("/z")).await;

        assert_eq!(again.headers()["x-cache"], "HIT");
        assert_eq!(store.len(), 1);
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn query_and_method_policy_separates_entries() {
        let origin = Arc::new(MockOrigin::default());
        let cache = CacheConfig {
            include_query: true,
            include_method: true,
            ..CacheConfig::default()
        };
        let (dispatcher, store) = dispatcher(cache, origin.clone());

        dispatcher.handle(get("/q?page=1")).await;
        let other_query = dispatcher.handle(get("/q?page=2")).await;
        let post = dispatcher
            .handle(
                Request::builder()
                    .method(Method::POST)
                    .uri("/q?page=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        let repeat = dispatcher.handle(get("/q?page=1")).await;

        assert_eq!(other_query.headers()["x-cache"], "MISS");
        assert_eq!(post.headers()["x-cache"], "MISS");
        assert_eq!(repeat.headers()["x-cache"], "HIT");
        assert_eq!(origin.calls(), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let origin = Arc::new(MockOrigin {
            delay: Duration::from_millis(100),
            ..MockOrigin::default()
        });
        let (dispatcher, _) = dispatcher(CacheConfig::default(), origin.clone());
        let dispatcher = Arc::new(dispatcher);

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { text(dispatcher.handle(get("/hot")).await).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), "/hot 1");
        }
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_failure_is_shared_and_not_cached() {
        let origin = Arc::new(MockOrigin {
            delay: Duration::from_millis(100),
            ..MockOrigin::default()
        });
        origin.failing.store(true, Ordering::SeqCst);
        let (dispatcher, store) = dispatcher(CacheConfig::default(), origin.clone());
        let dispatcher = Arc::new(dispatcher);

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.handle(get("/down")).await.status() })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(origin.calls(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn without_single_flight_every_miss_fetches() {
        let origin = Arc::new(MockOrigin {
            delay: Duration::from_millis(50),
            ..MockOrigin::default()
        });
        let cache = CacheConfig {
            single_flight: false,
            ..CacheConfig::default()
        };
        let (dispatcher, _) = dispatcher(cache, origin.clone());
        let dispatcher = Arc::new(dispatcher);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.handle(get("/cold")).await.status() })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }
        assert_eq!(origin.calls(), 4);
    }

    #[tokio::test]
    async fn cancelled_leader_hands_over_to_waiter() {
        let origin = Arc::new(MockOrigin {
            delay: Duration::from_millis(200),
            ..MockOrigin::default()
        });
        let (dispatcher, _) = dispatcher(CacheConfig::default(), origin.clone());
        let dispatcher = Arc::new(dispatcher);

        let leader = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(get("/slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(get("/slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let response = follower.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "/slow 2");
        assert_eq!(origin.calls(), 2);
    }
}
