//! Query executor
//!
//! Execution flow:
//! 1. Snapshot the query and validate it
//! 2. Compute the fingerprint and cache key
//! 3. Consult the cache if the policy reads cache first
//! 4. Otherwise (or on a miss) call the transport
//! 5. Store the network result if the policy writes the cache
//! 6. On network failure under `NetworkElseCache`, fall back to any entry
//!
//! No retries happen here; transport errors are surfaced as-is.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cache::{
    self, CacheEntry, CacheKey, CachePolicy, CacheStore, CachedPayload, Record, RequestKind,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::query::{QueryError, QuerySpec};

use super::delivery::{Deliveries, Delivery, ResultShape, Source};
use super::errors::{ExecError, ExecResult};
use super::state::{ExecutionState, ExecutionTrace};
use super::transport::{Transport, TransportError};

/// Executor-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Max age applied when a spec sets none; `None` means never stale
    pub default_max_cache_age: Option<Duration>,
}

type Sink<'a> = Option<&'a mpsc::UnboundedSender<Delivery<CachedPayload>>>;

/// Runs queries against a transport and a cache store
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
    store: Arc<CacheStore>,
    metrics: Arc<MetricsRegistry>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    /// Executor over an explicit store
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CacheStore>) -> Self {
        Self {
            transport,
            store,
            metrics: Arc::new(MetricsRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Executor over the process-wide store
    pub fn with_global_cache(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, cache::global())
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Whether a `CacheOnly` list request for `spec` would be served.
    ///
    /// Uses the same max-age resolution as execution. No side effects.
    pub fn has_cached_result(&self, spec: &QuerySpec) -> bool {
        self.has_cached_result_for(spec, RequestKind::List)
    }

    pub fn has_cached_result_for(&self, spec: &QuerySpec, kind: RequestKind) -> bool {
        spec.has_cached_result_for(&self.store, kind, self.config.default_max_cache_age)
    }

    // =========================================================================
    // Foreground API: resolves to the final delivery
    // =========================================================================

    /// Fetch the records matching `spec`
    pub async fn find(&self, spec: &QuerySpec) -> ExecResult<Vec<Record>> {
        self.run_final(spec.clone(), RequestKind::List).await
    }

    /// Fetch one record of `spec`'s collection by id
    pub async fn get_object(&self, spec: &QuerySpec, object_id: &str) -> ExecResult<Record> {
        self.run_final(spec.clone(), RequestKind::Object(object_id.to_string()))
            .await
    }

    /// Count the records matching `spec`
    pub async fn count(&self, spec: &QuerySpec) -> ExecResult<u64> {
        self.run_final(spec.clone(), RequestKind::Count).await
    }

    // =========================================================================
    // Background API: returns immediately, results arrive on the receiver.
    // Must be called from within a tokio runtime.
    // =========================================================================

    pub fn find_in_background(&self, spec: &QuerySpec) -> Deliveries<Vec<Record>> {
        self.spawn(spec.clone(), RequestKind::List)
    }

    pub fn get_object_in_background(
        &self,
        spec: &QuerySpec,
        object_id: &str,
    ) -> Deliveries<Record> {
        self.spawn(spec.clone(), RequestKind::Object(object_id.to_string()))
    }

    pub fn count_in_background(&self, spec: &QuerySpec) -> Deliveries<u64> {
        self.spawn(spec.clone(), RequestKind::Count)
    }

    async fn run_final<T: ResultShape>(&self, spec: QuerySpec, kind: RequestKind) -> ExecResult<T> {
        self.run(spec, kind, None)
            .await
            .result
            .and_then(T::from_payload)
    }

    fn spawn<T: ResultShape>(&self, spec: QuerySpec, kind: RequestKind) -> Deliveries<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = self.clone();
        tokio::spawn(async move {
            let last = executor.run(spec, kind, Some(&tx)).await;
            let _ = tx.send(last);
        });
        Deliveries::new(rx)
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Runs one execution and returns its final delivery.
    ///
    /// Intermediate deliveries (the cached half of `CacheThenNetwork`) go to
    /// `sink`; foreground calls pass none and only see the final one.
    async fn run(
        &self,
        spec: QuerySpec,
        kind: RequestKind,
        sink: Sink<'_>,
    ) -> Delivery<CachedPayload> {
        let mut trace = ExecutionTrace::new();
        let request_id = trace.request_id().to_string();
        let policy = spec.cache_policy();
        let kind_str = kind.to_string();

        self.metrics.increment_executions();
        log_event_with_fields(
            Event::QueryBegin,
            &[
                ("collection", spec.collection()),
                ("kind", &kind_str),
                ("policy", policy.as_str()),
                ("request_id", &request_id),
            ],
        );

        if let Err(e) = validate_request(&spec, &kind) {
            return self.finish(&mut trace, Source::Network, Err(e.into()));
        }

        let key = CacheKey::new(spec.fingerprint(), kind);
        trace.advance(ExecutionState::FingerprintComputed);
        let max_age = spec.effective_max_cache_age(self.config.default_max_cache_age);

        if policy.reads_cache_first() {
            trace.advance(ExecutionState::CacheConsulted);
            let cached = if policy == CachePolicy::CacheThenNetwork {
                self.store.peek(&key)
            } else {
                self.store.get_fresh(&key, max_age)
            };
            let key_str = key.to_string();

            match cached {
                Some(entry) => {
                    self.metrics.increment_cache_hits();
                    log_event_with_fields(
                        Event::CacheHit,
                        &[("key", &key_str), ("request_id", &request_id)],
                    );
                    trace.advance(ExecutionState::CacheSatisfied);

                    if policy != CachePolicy::CacheThenNetwork {
                        return self.finish(&mut trace, Source::Cache, Ok(entry.payload));
                    }
                    if let Some(tx) = sink {
                        self.metrics.increment_deliveries();
                        let _ = tx.send(Delivery::new(Source::Cache, Ok(entry.payload)));
                    }
                }
                None => {
                    self.metrics.increment_cache_misses();
                    log_event_with_fields(
                        Event::CacheMiss,
                        &[("key", &key_str), ("request_id", &request_id)],
                    );
                    if !policy.uses_network() {
                        let err = ExecError::cache_miss(key);
                        return self.finish(&mut trace, Source::Cache, Err(err));
                    }
                }
            }
        }

        trace.advance(ExecutionState::NetworkPending);
        self.metrics.increment_network_requests();
        log_event_with_fields(
            Event::NetworkRequest,
            &[("kind", &kind_str), ("request_id", &request_id)],
        );

        match self.fetch_remote(&spec, &key.kind).await {
            Ok(payload) => {
                let payload = self.truncate(payload, spec.limit(), &request_id);
                if policy.writes_cache() {
                    self.store.put(CacheEntry::new(key, payload.clone()));
                    self.metrics.increment_cache_writes();
                }
                self.finish(&mut trace, Source::Network, Ok(payload))
            }
            Err(err) => {
                self.metrics.increment_network_failures();
                let err_str = err.to_string();
                log_event_with_fields(
                    Event::NetworkFailed,
                    &[("error", &err_str), ("request_id", &request_id)],
                );

                if policy == CachePolicy::NetworkElseCache
                    && matches!(err, TransportError::Failed(_))
                {
                    trace.advance(ExecutionState::CacheConsulted);
                    if let Some(entry) = self.store.peek(&key) {
                        self.metrics.increment_cache_fallbacks();
                        let key_str = key.to_string();
                        log_event_with_fields(
                            Event::CacheFallback,
                            &[("key", &key_str), ("request_id", &request_id)],
                        );
                        trace.advance(ExecutionState::CacheSatisfied);
                        return self.finish(&mut trace, Source::Cache, Ok(entry.payload));
                    }
                }

                let err = match (err, &key.kind) {
                    (TransportError::NotFound, RequestKind::Object(id)) => {
                        ExecError::not_found(spec.collection(), id.as_str())
                    }
                    (other, _) => ExecError::Transport(other),
                };
                self.finish(&mut trace, Source::Network, Err(err))
            }
        }
    }

    async fn fetch_remote(
        &self,
        spec: &QuerySpec,
        kind: &RequestKind,
    ) -> Result<CachedPayload, TransportError> {
        match kind {
            RequestKind::List => {
                let query = spec.to_serialized();
                self.transport
                    .fetch_list(&query)
                    .await
                    .map(CachedPayload::Records)
            }
            RequestKind::Count => {
                let query = spec.to_count_query();
                self.transport.count(&query).await.map(CachedPayload::Count)
            }
            RequestKind::Object(id) => self
                .transport
                .fetch_by_id(spec.collection(), id)
                .await
                .map(CachedPayload::Record),
        }
    }

    /// Cuts list results down to a non-zero limit
    fn truncate(&self, payload: CachedPayload, limit: u64, request_id: &str) -> CachedPayload {
        match payload {
            CachedPayload::Records(mut records) if limit > 0 && records.len() as u64 > limit => {
                let received = records.len().to_string();
                let limit_str = limit.to_string();
                log_event_with_fields(
                    Event::ResultTruncated,
                    &[
                        ("limit", &limit_str),
                        ("received", &received),
                        ("request_id", request_id),
                    ],
                );
                self.metrics.increment_results_truncated();
                records.truncate(limit as usize);
                CachedPayload::Records(records)
            }
            other => other,
        }
    }

    fn finish(
        &self,
        trace: &mut ExecutionTrace,
        source: Source,
        result: ExecResult<CachedPayload>,
    ) -> Delivery<CachedPayload> {
        let request_id = trace.request_id().to_string();
        let elapsed = trace.elapsed_ms();

        match &result {
            Ok(payload) => {
                trace.advance(ExecutionState::Completed);
                let records = payload.record_count().to_string();
                log_event_with_fields(
                    Event::QueryComplete,
                    &[
                        ("elapsed_ms", &elapsed),
                        ("records", &records),
                        ("request_id", &request_id),
                        ("source", source.as_str()),
                    ],
                );
            }
            Err(e) => {
                trace.advance(ExecutionState::Failed);
                self.metrics.increment_executions_failed();
                let message = e.to_string();
                log_event_with_fields(
                    Event::QueryFailed,
                    &[
                        ("code", e.code()),
                        ("elapsed_ms", &elapsed),
                        ("message", &message),
                        ("request_id", &request_id),
                    ],
                );
            }
        }

        self.metrics.increment_deliveries();
        Delivery::new(source, result)
    }
}

fn validate_request(spec: &QuerySpec, kind: &RequestKind) -> Result<(), QueryError> {
    spec.validate()?;
    if let RequestKind::Object(id) = kind {
        if id.trim().is_empty() {
            return Err(QueryError::invalid_constraint("object id must be non-empty"));
        }
    }
    Ok(())
}
