//! Process-wide response cache
//!
//! One mutex guards the whole map. Lookups are synchronous and never
//! suspend. Eviction is lazy: a stale entry is removed only when
//! `get_fresh` reads it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::observability::{log_event_with_fields, Event};
use crate::query::Fingerprint;

use super::entry::{CacheEntry, CacheKey};

static GLOBAL: OnceLock<Arc<CacheStore>> = OnceLock::new();

/// Returns the process-wide store, created empty on first use
pub fn global() -> Arc<CacheStore> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(CacheStore::new())))
}

/// Store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writes: u64,
}

/// Keyed response cache, one entry per `CacheKey`
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    writes: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisoning is ignored: no operation leaves the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry regardless of age. No side effects.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    /// Returns the entry if it is fresh under `max_age`.
    ///
    /// A stale entry is evicted and reported as a miss.
    pub fn get_fresh(&self, key: &CacheKey, max_age: Option<Duration>) -> Option<CacheEntry> {
        let mut entries = self.lock();
        let stale = match entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.is_stale(max_age, Utc::now()),
        };

        if stale {
            entries.remove(key);
            drop(entries);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            let key_str = key.to_string();
            log_event_with_fields(Event::CacheEvicted, &[("key", &key_str)]);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).cloned()
    }

    /// True if a fresh entry exists. No side effects, stale entries are kept.
    pub fn contains_fresh(&self, key: &CacheKey, max_age: Option<Duration>) -> bool {
        self.lock()
            .get(key)
            .map(|entry| !entry.is_stale(max_age, Utc::now()))
            .unwrap_or(false)
    }

    /// Stores `entry`, replacing any entry under the same key
    pub fn put(&self, entry: CacheEntry) {
        let key_str = entry.key.to_string();
        self.lock().insert(entry.key.clone(), entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        log_event_with_fields(Event::CacheWrite, &[("key", &key_str)]);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().remove(key)
    }

    /// Removes every request kind cached for `fingerprint`; returns how many
    pub fn remove_fingerprint(&self, fingerprint: &Fingerprint) -> usize {
        let removed = {
            let mut entries = self.lock();
            let before = entries.len();
            entries.retain(|key, _| &key.fingerprint != fingerprint);
            before - entries.len()
        };
        let removed_str = removed.to_string();
        log_event_with_fields(
            Event::CacheCleared,
            &[("fingerprint", fingerprint.short()), ("removed", &removed_str)],
        );
        removed
    }

    /// Empties the store; returns how many entries were dropped
    pub fn clear(&self) -> usize {
        let removed = {
            let mut entries = self.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        let removed_str = removed.to_string();
        log_event_with_fields(Event::CacheCleared, &[("removed", &removed_str)]);
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// All entries, ordered by key for deterministic output
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| {
            (&a.key.fingerprint, a.key.kind.to_string())
                .cmp(&(&b.key.fingerprint, b.key.kind.to_string()))
        });
        entries
    }

    /// Replaces the whole content with `entries`
    pub(crate) fn replace_all(&self, entries: Vec<CacheEntry>) {
        let mut map = self.lock();
        map.clear();
        map.extend(entries.into_iter().map(|e| (e.key.clone(), e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedPayload, RequestKind};
    use crate::query::QuerySpec;
    use serde_json::json;

    fn key_for(collection: &str, kind: RequestKind) -> CacheKey {
        CacheKey::new(QuerySpec::new(collection).unwrap().fingerprint(), kind)
    }

    fn aged(key: CacheKey, secs: i64) -> CacheEntry {
        CacheEntry::with_timestamp(
            key,
            CachedPayload::Count(1),
            Utc::now() - chrono::Duration::seconds(secs),
        )
    }

    #[test]
    fn test_put_overwrites() {
        let store = CacheStore::new();
        let key = key_for("Post", RequestKind::Count);

        store.put(CacheEntry::new(key.clone(), CachedPayload::Count(1)));
        store.put(CacheEntry::new(key.clone(), CachedPayload::Count(2)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(&key).unwrap().payload, CachedPayload::Count(2));
        assert_eq!(store.stats().writes, 2);
    }

    #[test]
    fn test_get_fresh_evicts_stale() {
        let store = CacheStore::new();
        let key = key_for("Post", RequestKind::Count);
        store.put(aged(key.clone(), 600));

        assert!(store.get_fresh(&key, Some(Duration::from_secs(60))).is_none());
        assert!(store.peek(&key).is_none());

        let stats = store.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_get_fresh_hit() {
        let store = CacheStore::new();
        let key = key_for("Post", RequestKind::Count);
        store.put(aged(key.clone(), 600));

        assert!(store.get_fresh(&key, None).is_some());
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_contains_fresh_has_no_side_effects() {
        let store = CacheStore::new();
        let key = key_for("Post", RequestKind::Count);
        store.put(aged(key.clone(), 600));

        assert!(!store.contains_fresh(&key, Some(Duration::from_secs(60))));
        assert!(store.peek(&key).is_some());
        assert_eq!(store.stats(), CacheStats { writes: 1, ..CacheStats::default() });
    }

    #[test]
    fn test_remove_fingerprint_drops_all_kinds() {
        let store = CacheStore::new();
        let list = key_for("Post", RequestKind::List);
        let count = key_for("Post", RequestKind::Count);
        let other = key_for("Comment", RequestKind::List);

        store.put(CacheEntry::new(list.clone(), CachedPayload::Records(vec![json!({})])));
        store.put(CacheEntry::new(count, CachedPayload::Count(1)));
        store.put(CacheEntry::new(other.clone(), CachedPayload::Records(vec![])));

        assert_eq!(store.remove_fingerprint(&list.fingerprint), 2);
        assert_eq!(store.len(), 1);
        assert!(store.peek(&other).is_some());
    }

    #[test]
    fn test_clear() {
        let store = CacheStore::new();
        store.put(CacheEntry::new(
            key_for("Post", RequestKind::List),
            CachedPayload::Records(vec![]),
        ));
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert_eq!(store.clear(), 0);
    }

    #[test]
    fn test_global_is_shared() {
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_puts() {
        use std::thread;

        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = key_for(&format!("C{}", i), RequestKind::Count);
                    for n in 0..50 {
                        store.put(CacheEntry::new(key.clone(), CachedPayload::Count(n)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        assert_eq!(store.stats().writes, 400);
    }
}
