//! Response cache
//!
//! Responses are keyed by query fingerprint plus request kind. The store is
//! in-memory and process-wide (`global()`), but executors take an injected
//! `Arc<CacheStore>` so tests can run against isolated stores.
//!
//! Freshness is decided at read time against the caller's max age; there is
//! no background eviction. Stores can optionally be persisted to a
//! checksummed JSON snapshot.

mod entry;
mod errors;
mod persist;
mod policy;
mod store;

pub use entry::{CacheEntry, CacheKey, CachedPayload, Record, RequestKind};
pub use errors::{CacheError, CacheResult};
pub use persist::{format_checksum, read_snapshot, write_snapshot, SNAPSHOT_VERSION};
pub use policy::CachePolicy;
pub use store::{global, CacheStats, CacheStore};
