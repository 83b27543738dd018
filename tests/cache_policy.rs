//! Cache policy tests
//!
//! End-to-end executions against an in-memory transport:
//! - NetworkOnly fetches, delivers in remote order and stores the result
//! - CacheOnly never touches the network
//! - CacheThenNetwork delivers twice when an entry exists
//! - NetworkElseCache falls back on transport failure
//! - Cache helpers agree with what an execution would serve

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use objquery::cache::{
    CacheEntry, CacheKey, CachePolicy, CacheStore, CachedPayload, Record, RequestKind,
};
use objquery::executor::{
    ExecError, ExecutorConfig, QueryExecutor, Source, Transport, TransportError, TransportFuture,
};
use objquery::query::{ConstraintBuilder, QuerySpec, SerializedQuery};

// =============================================================================
// Test Utilities
// =============================================================================

/// Serves a fixed record list, or fails every call while `down` is set
struct MemoryTransport {
    records: Vec<Record>,
    down: Mutex<bool>,
    calls: AtomicUsize,
    last_query: Mutex<Option<SerializedQuery>>,
}

impl MemoryTransport {
    fn new(records: Vec<Record>) -> Arc<Self> {
        Arc::new(Self {
            records,
            down: Mutex::new(false),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        })
    }

    fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(TransportError::failed("connection refused"));
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn fetch_by_id<'a>(
        &'a self,
        _collection: &'a str,
        object_id: &'a str,
    ) -> TransportFuture<'a, Record> {
        Box::pin(async move {
            self.check()?;
            self.records
                .iter()
                .find(|r| r["objectId"] == object_id)
                .cloned()
                .ok_or(TransportError::NotFound)
        })
    }

    fn fetch_list<'a>(&'a self, query: &'a SerializedQuery) -> TransportFuture<'a, Vec<Record>> {
        Box::pin(async move {
            self.check()?;
            *self.last_query.lock().unwrap() = Some(query.clone());
            Ok(self.records.clone())
        })
    }

    fn count<'a>(&'a self, _query: &'a SerializedQuery) -> TransportFuture<'a, u64> {
        Box::pin(async move {
            self.check()?;
            Ok(self.records.len() as u64)
        })
    }
}

fn published_posts() -> Vec<Record> {
    vec![
        json!({"objectId": "a", "title": "first", "status": "published"}),
        json!({"objectId": "b", "title": "second", "status": "published"}),
        json!({"objectId": "c", "title": "third", "status": "published"}),
    ]
}

fn published(policy: CachePolicy) -> QuerySpec {
    let mut q = QuerySpec::new("Post").unwrap();
    q.where_equal_to("status", "published")
        .unwrap()
        .set_limit(10)
        .unwrap();
    q.set_cache_policy(policy, None);
    q
}

fn setup() -> (Arc<MemoryTransport>, Arc<CacheStore>, QueryExecutor) {
    let transport = MemoryTransport::new(published_posts());
    let store = Arc::new(CacheStore::new());
    let executor = QueryExecutor::new(transport.clone(), store.clone());
    (transport, store, executor)
}

fn list_key(spec: &QuerySpec) -> CacheKey {
    CacheKey::new(spec.fingerprint(), RequestKind::List)
}

// =============================================================================
// NetworkOnly / IgnoreCache
// =============================================================================

#[tokio::test]
async fn test_network_only_delivers_and_stores() {
    let (transport, store, executor) = setup();
    let spec = published(CachePolicy::NetworkOnly);

    let records = executor.find(&spec).await.unwrap();

    assert_eq!(records, published_posts());
    assert_eq!(transport.calls(), 1);
    let entry = store.peek(&list_key(&spec)).expect("entry written");
    assert_eq!(entry.payload, CachedPayload::Records(published_posts()));

    let sent = transport.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(sent.class_name(), "Post");
    assert_eq!(sent.limit(), 10);
    assert_eq!(sent.where_clause()["status"], "published");
}

#[tokio::test]
async fn test_ignore_cache_does_not_store() {
    let (_transport, store, executor) = setup();
    let spec = published(CachePolicy::IgnoreCache);

    executor.find(&spec).await.unwrap();
    assert!(store.is_empty());
    assert!(!executor.has_cached_result(&spec));
}

#[tokio::test]
async fn test_list_truncated_to_limit() {
    let (_transport, _store, executor) = setup();
    let mut spec = published(CachePolicy::NetworkOnly);
    spec.set_limit(2).unwrap();

    let records = executor.find(&spec).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["objectId"], "a");
    assert_eq!(executor.metrics().snapshot().results_truncated, 1);
}

// =============================================================================
// CacheOnly / CacheElseNetwork
// =============================================================================

#[tokio::test]
async fn test_cache_only_miss_never_calls_network() {
    let (transport, _store, executor) = setup();
    let spec = published(CachePolicy::CacheOnly);

    let err = executor.find(&spec).await.unwrap_err();

    assert!(matches!(err, ExecError::CacheMiss { .. }));
    assert_eq!(err.code(), "OBJQ_CACHE_MISS");
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_cache_only_after_network_fill() {
    let (transport, _store, executor) = setup();
    executor.find(&published(CachePolicy::NetworkOnly)).await.unwrap();

    let records = executor.find(&published(CachePolicy::CacheOnly)).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_cache_else_network_refetches_stale_entry() {
    let (transport, store, executor) = setup();
    let mut spec = published(CachePolicy::CacheElseNetwork);
    spec.set_cache_policy(CachePolicy::CacheElseNetwork, Some(Duration::from_secs(60)));

    let old = Utc::now() - chrono::Duration::seconds(3600);
    store.put(CacheEntry::with_timestamp(
        list_key(&spec),
        CachedPayload::Records(vec![json!({"objectId": "stale"})]),
        old,
    ));

    let records = executor.find(&spec).await.unwrap();
    assert_eq!(records, published_posts());
    assert_eq!(transport.calls(), 1);

    // Fresh now: served from cache
    executor.find(&spec).await.unwrap();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_executor_default_max_age_applies() {
    let (transport, store, executor) = setup();
    let executor = executor.with_config(ExecutorConfig {
        default_max_cache_age: Some(Duration::from_secs(1)),
    });
    let spec = published(CachePolicy::CacheElseNetwork);

    store.put(CacheEntry::with_timestamp(
        list_key(&spec),
        CachedPayload::Records(Vec::new()),
        Utc::now() - chrono::Duration::seconds(30),
    ));

    executor.find(&spec).await.unwrap();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_has_cached_result_uses_executor_default_age() {
    let (transport, store, executor) = setup();
    let executor = executor.with_config(ExecutorConfig {
        default_max_cache_age: Some(Duration::from_secs(60)),
    });
    let spec = published(CachePolicy::CacheOnly);

    store.put(CacheEntry::with_timestamp(
        list_key(&spec),
        CachedPayload::Records(published_posts()),
        Utc::now() - chrono::Duration::minutes(10),
    ));

    assert!(!executor.has_cached_result(&spec));
    assert!(!spec.has_cached_result(&store, executor.config().default_max_cache_age));
    // Without a default the entry never goes stale
    assert!(spec.has_cached_result(&store, None));

    let err = executor.find(&spec).await.unwrap_err();
    assert!(matches!(err, ExecError::CacheMiss { .. }));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_has_cached_result_agrees_with_cache_only_hit() {
    let (_transport, store, executor) = setup();
    let executor = executor.with_config(ExecutorConfig {
        default_max_cache_age: Some(Duration::from_secs(60)),
    });
    let spec = published(CachePolicy::CacheOnly);
    store.put(CacheEntry::new(
        list_key(&spec),
        CachedPayload::Records(published_posts()),
    ));

    assert!(executor.has_cached_result(&spec));
    assert_eq!(executor.find(&spec).await.unwrap(), published_posts());
}

// =============================================================================
// CacheThenNetwork
// =============================================================================

#[tokio::test]
async fn test_cache_then_network_delivers_twice() {
    let (_transport, store, executor) = setup();
    let mut spec = published(CachePolicy::CacheThenNetwork);
    spec.set_cache_policy(CachePolicy::CacheThenNetwork, Some(Duration::from_secs(1)));

    let cached = vec![json!({"objectId": "old"})];
    store.put(CacheEntry::with_timestamp(
        list_key(&spec),
        CachedPayload::Records(cached.clone()),
        Utc::now() - chrono::Duration::seconds(600),
    ));

    let deliveries = executor.find_in_background(&spec).collect().await;

    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].source, Source::Cache);
    assert_eq!(deliveries[0].result, Ok(cached));
    assert_eq!(deliveries[1].source, Source::Network);
    assert_eq!(deliveries[1].result, Ok(published_posts()));

    // Network result replaced the cached entry
    assert_eq!(
        store.peek(&list_key(&spec)).unwrap().payload,
        CachedPayload::Records(published_posts())
    );
}

#[tokio::test]
async fn test_cache_then_network_without_entry_delivers_once() {
    let (_transport, _store, executor) = setup();
    let spec = published(CachePolicy::CacheThenNetwork);

    let deliveries = executor.find_in_background(&spec).collect().await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].source, Source::Network);
    assert!(deliveries[0].is_ok());
}

#[tokio::test]
async fn test_cache_then_network_failure_after_cached_delivery() {
    let (transport, store, executor) = setup();
    let spec = published(CachePolicy::CacheThenNetwork);
    store.put(CacheEntry::new(list_key(&spec), CachedPayload::Records(Vec::new())));
    transport.set_down(true);

    let deliveries = executor.find_in_background(&spec).collect().await;
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries[0].is_ok());
    assert_eq!(
        deliveries[1].result,
        Err(ExecError::Transport(TransportError::failed("connection refused")))
    );
}

// =============================================================================
// NetworkElseCache
// =============================================================================

#[tokio::test]
async fn test_network_else_cache_falls_back_on_failure() {
    let (transport, _store, executor) = setup();
    let spec = published(CachePolicy::NetworkElseCache);
    executor.find(&spec).await.unwrap();

    transport.set_down(true);
    let mut deliveries = executor.find_in_background(&spec);
    let delivery = deliveries.next().await.unwrap();
    assert_eq!(delivery.source, Source::Cache);
    assert_eq!(delivery.result, Ok(published_posts()));
    assert!(deliveries.next().await.is_none());

    assert_eq!(executor.metrics().snapshot().cache_fallbacks, 1);
}

#[tokio::test]
async fn test_network_else_cache_without_entry_surfaces_error() {
    let (transport, _store, executor) = setup();
    transport.set_down(true);

    let err = executor
        .count(&published(CachePolicy::NetworkElseCache))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OBJQ_TRANSPORT");
}

// =============================================================================
// Request kinds
// =============================================================================

#[tokio::test]
async fn test_count_and_list_cached_separately() {
    let (_transport, _store, executor) = setup();
    let spec = published(CachePolicy::NetworkOnly);

    assert_eq!(executor.count(&spec).await.unwrap(), 3);
    assert!(executor.has_cached_result_for(&spec, RequestKind::Count));
    assert!(!executor.has_cached_result(&spec));

    let err = executor
        .find(&published(CachePolicy::CacheOnly))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::CacheMiss { .. }));
}

#[tokio::test]
async fn test_get_object_not_found() {
    let (_transport, _store, executor) = setup();
    let spec = published(CachePolicy::NetworkOnly);

    assert_eq!(executor.get_object(&spec, "b").await.unwrap()["title"], "second");
    assert_eq!(
        executor.get_object(&spec, "zzz").await.unwrap_err(),
        ExecError::not_found("Post", "zzz")
    );
}

#[tokio::test]
async fn test_empty_object_id_rejected() {
    let (transport, _store, executor) = setup();
    let err = executor
        .get_object(&published(CachePolicy::NetworkOnly), " ")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::InvalidQuery(_)));
    assert_eq!(transport.calls(), 0);
}

// =============================================================================
// Cache helpers
// =============================================================================

#[tokio::test]
async fn test_clear_cached_result_scoped_to_query() {
    let (_transport, store, executor) = setup();
    let posts = published(CachePolicy::NetworkOnly);
    let mut drafts = QuerySpec::new("Post").unwrap();
    drafts.where_equal_to("status", "draft").unwrap();
    drafts.set_cache_policy(CachePolicy::NetworkOnly, None);

    executor.find(&posts).await.unwrap();
    executor.count(&posts).await.unwrap();
    executor.find(&drafts).await.unwrap();

    assert_eq!(posts.clear_cached_result(&store), 2);
    assert!(!executor.has_cached_result(&posts));
    assert!(executor.has_cached_result(&drafts));
}

#[tokio::test]
async fn test_clear_all_then_cache_only_misses() {
    let (_transport, store, executor) = setup();
    executor.find(&published(CachePolicy::NetworkOnly)).await.unwrap();

    assert_eq!(QuerySpec::clear_all_cached_results(&store), 1);

    let err = executor
        .find(&published(CachePolicy::CacheOnly))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::CacheMiss { .. }));
}
