//! Cache snapshot files
//!
//! Layout (one JSON document):
//!
//! ```text
//! {
//!   "version": 1,
//!   "checksum": "crc32:deadbeef",
//!   "entries": [ { "key": {..}, "payload": {..}, "stored_at": ".." }, .. ]
//! }
//! ```
//!
//! The checksum covers the compact, key-sorted JSON text of `entries`. It is
//! verified on load; a mismatch fails with `CacheError::Corrupted`.
//! Snapshots are written to a sibling temp file, fsynced, then renamed over
//! the target.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::observability::{log_event_with_fields, Event};
use crate::query::Fingerprint;

use super::entry::CacheEntry;
use super::errors::{CacheError, CacheResult};
use super::store::CacheStore;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    checksum: String,
    entries: JsonValue,
}

/// Format: `crc32:xxxxxxxx` (lowercase hex, zero-padded)
pub fn format_checksum(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// `serde_json::Value` keeps object keys sorted, so this text is stable
/// across a save/load cycle.
fn entries_checksum(entries: &JsonValue) -> String {
    format_checksum(compute_checksum(entries.to_string().as_bytes()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `entries` to `path`
pub fn write_snapshot(path: &Path, entries: &[CacheEntry]) -> CacheResult<()> {
    let entries = serde_json::to_value(entries)?;
    let snapshot = SnapshotFile {
        version: SNAPSHOT_VERSION,
        checksum: entries_checksum(&entries),
        entries,
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    let tmp = temp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::io_at_path(path, e));
    }
    Ok(())
}

/// Reads and verifies the snapshot at `path`
pub fn read_snapshot(path: &Path) -> CacheResult<Vec<CacheEntry>> {
    let bytes = fs::read(path).map_err(|e| CacheError::io_at_path(path, e))?;
    let snapshot: SnapshotFile = serde_json::from_slice(&bytes)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CacheError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let actual = entries_checksum(&snapshot.entries);
    if actual != snapshot.checksum {
        return Err(CacheError::corrupted(format!(
            "checksum mismatch: header {}, computed {}",
            snapshot.checksum, actual
        )));
    }

    let entries: Vec<CacheEntry> = serde_json::from_value(snapshot.entries)
        .map_err(|e| CacheError::corrupted(format!("malformed entry: {}", e)))?;

    for entry in &entries {
        if Fingerprint::from_hex(entry.key.fingerprint.as_str()).is_none() {
            return Err(CacheError::corrupted(format!(
                "invalid fingerprint '{}'",
                entry.key.fingerprint
            )));
        }
        if !entry.payload.matches_kind(&entry.key.kind) {
            return Err(CacheError::corrupted(format!(
                "{} payload stored under {} key",
                entry.payload.type_name(),
                entry.key.kind
            )));
        }
    }

    Ok(entries)
}

impl CacheStore {
    /// Writes every entry to `path`; returns the entry count
    pub fn save_to(&self, path: &Path) -> CacheResult<usize> {
        let entries = self.entries();
        write_snapshot(path, &entries)?;

        let count = entries.len().to_string();
        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::SnapshotSaved,
            &[("entries", &count), ("path", &path_str)],
        );
        Ok(entries.len())
    }

    /// Replaces the store's content with the snapshot at `path`.
    ///
    /// The store is left untouched if the snapshot fails verification.
    pub fn load_from(&self, path: &Path) -> CacheResult<usize> {
        let entries = read_snapshot(path)?;
        let n = entries.len();
        self.replace_all(entries);

        let count = n.to_string();
        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::SnapshotLoaded,
            &[("entries", &count), ("path", &path_str)],
        );
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, CachedPayload, RequestKind};
    use crate::query::QuerySpec;
    use serde_json::json;
    use tempfile::TempDir;

    fn populated_store() -> CacheStore {
        let store = CacheStore::new();
        let fp = QuerySpec::new("Post").unwrap().fingerprint();
        store.put(CacheEntry::new(
            CacheKey::new(fp.clone(), RequestKind::List),
            CachedPayload::Records(vec![json!({"objectId": "a1", "score": 1.5})]),
        ));
        store.put(CacheEntry::new(
            CacheKey::new(fp, RequestKind::Count),
            CachedPayload::Count(7),
        ));
        store
    }

    #[test]
    fn test_format_checksum() {
        assert_eq!(format_checksum(0xDEADBEEF), "crc32:deadbeef");
        assert_eq!(format_checksum(0x1), "crc32:00000001");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let store = populated_store();
        assert_eq!(store.save_to(&path).unwrap(), 2);
        assert!(!temp_path(&path).exists());

        let restored = CacheStore::new();
        assert_eq!(restored.load_from(&path).unwrap(), 2);
        assert_eq!(restored.entries(), store.entries());
    }

    #[test]
    fn test_float_payloads_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let store = CacheStore::new();
        store.put(CacheEntry::new(
            CacheKey::new(QuerySpec::new("Place").unwrap().fingerprint(), RequestKind::List),
            CachedPayload::Records(vec![
                json!({"objectId": "p1", "lat": 30.414914285714286, "lng": -97.74306}),
                json!({"objectId": "p2", "score": 2.663987731472464e-34}),
            ]),
        ));
        store.save_to(&path).unwrap();

        let restored = CacheStore::new();
        assert_eq!(restored.load_from(&path).unwrap(), 1);
        assert_eq!(restored.entries(), store.entries());
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        populated_store().save_to(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"data\": 7", "\"data\": 8")).unwrap();

        let store = CacheStore::new();
        let err = store.load_from(&path).unwrap_err();
        assert!(matches!(err, CacheError::Corrupted(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let entries = json!([]);
        let doc = json!({
            "version": 99,
            "checksum": entries_checksum(&entries),
            "entries": entries,
        });
        fs::write(&path, doc.to_string()).unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_snapshot(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), "OBJQ_CACHE_IO");
    }

    #[test]
    fn test_mismatched_payload_kind_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let fp = QuerySpec::new("Post").unwrap().fingerprint();
        let entries = json!([{
            "key": {"fingerprint": fp.as_str(), "kind": "list"},
            "payload": {"type": "count", "data": 3},
            "stored_at": "2024-01-01T00:00:00Z",
        }]);
        let doc = json!({
            "version": SNAPSHOT_VERSION,
            "checksum": entries_checksum(&entries),
            "entries": entries,
        });
        fs::write(&path, doc.to_string()).unwrap();

        assert!(matches!(
            read_snapshot(&path).unwrap_err(),
            CacheError::Corrupted(_)
        ));
    }
}
