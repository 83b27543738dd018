//! Metrics registry for query execution
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start (or a new registry)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Execution counters.
///
/// Relaxed atomics: values are exact once all executions have finished.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    executions: AtomicU64,
    executions_failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_writes: AtomicU64,
    network_requests: AtomicU64,
    network_failures: AtomicU64,
    cache_fallbacks: AtomicU64,
    deliveries: AtomicU64,
    results_truncated: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_executions(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executions_failed(&self) {
        self.executions_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Cache metrics

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_writes(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Stale entry served after a network failure
    pub fn increment_cache_fallbacks(&self) {
        self.cache_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    // Network metrics

    pub fn increment_network_requests(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_network_failures(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Delivery metrics

    pub fn increment_deliveries(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_results_truncated(&self) {
        self.results_truncated.fetch_add(1, Ordering::Relaxed);
    }

    /// All counters as one JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            executions_failed: self.executions_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            cache_fallbacks: self.cache_fallbacks.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            results_truncated: self.results_truncated.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub executions_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_writes: u64,
    pub network_requests: u64,
    pub network_failures: u64,
    pub cache_fallbacks: u64,
    pub deliveries: u64,
    pub results_truncated: u64,
}
