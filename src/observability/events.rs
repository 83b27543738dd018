//! Observable events
//!
//! Every log line objquery writes names one of these events.

use std::fmt;

use super::logger::Severity;

/// Observable events in objquery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Client configuration loaded
    ConfigLoaded,

    // Execution
    /// Execution triggered
    QueryBegin,
    /// State machine transition
    QueryState,
    /// Execution delivered its final result
    QueryComplete,
    /// Execution failed
    QueryFailed,
    /// List result cut down to the query limit
    ResultTruncated,

    // Cache
    /// Usable entry found
    CacheHit,
    /// No usable entry
    CacheMiss,
    /// Stale entry dropped on read
    CacheEvicted,
    /// Entry stored or overwritten
    CacheWrite,
    /// Entries removed by fingerprint or cleared entirely
    CacheCleared,
    /// Stale entry served because the network failed
    CacheFallback,

    // Network
    /// Transport call dispatched
    NetworkRequest,
    /// Transport call failed
    NetworkFailed,

    // Persistence
    /// Cache snapshot written
    SnapshotSaved,
    /// Cache snapshot read back
    SnapshotLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::QueryBegin => "QUERY_BEGIN",
            Event::QueryState => "QUERY_STATE",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
            Event::ResultTruncated => "RESULT_TRUNCATED",

            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::CacheEvicted => "CACHE_EVICTED",
            Event::CacheWrite => "CACHE_WRITE",
            Event::CacheCleared => "CACHE_CLEARED",
            Event::CacheFallback => "CACHE_FALLBACK",

            Event::NetworkRequest => "NETWORK_REQUEST",
            Event::NetworkFailed => "NETWORK_FAILED",

            Event::SnapshotSaved => "CACHE_SNAPSHOT_SAVED",
            Event::SnapshotLoaded => "CACHE_SNAPSHOT_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryBegin
            | Event::QueryState
            | Event::CacheHit
            | Event::CacheMiss
            | Event::CacheWrite
            | Event::NetworkRequest => Severity::Trace,
            Event::CacheFallback | Event::ResultTruncated | Event::NetworkFailed => Severity::Warn,
            Event::QueryFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
