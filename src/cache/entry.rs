//! Cache keys, payloads and entries

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::Fingerprint;

/// Raw record as returned by the transport
pub type Record = serde_json::Value;

/// The three request kinds sharing one query fingerprint.
///
/// Serialized as `list`, `count` or `object:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RequestKind {
    List,
    Count,
    /// Fetch-by-id; carries the object id
    Object(String),
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::List => "list",
            RequestKind::Count => "count",
            RequestKind::Object(_) => "object",
        }
    }
}

impl From<RequestKind> for String {
    fn from(kind: RequestKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for RequestKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "list" => Ok(RequestKind::List),
            "count" => Ok(RequestKind::Count),
            other => match other.strip_prefix("object:") {
                Some(id) if !id.is_empty() => Ok(RequestKind::Object(id.to_string())),
                _ => Err(format!("unknown request kind '{}'", other)),
            },
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Object(id) => write!(f, "object:{}", id),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Cache key: query shape plus request kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub kind: RequestKind,
}

impl CacheKey {
    pub fn new(fingerprint: Fingerprint, kind: RequestKind) -> Self {
        Self { fingerprint, kind }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fingerprint.short(), self.kind)
    }
}

/// Result payload, tagged by request kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CachedPayload {
    Records(Vec<Record>),
    Record(Record),
    Count(u64),
}

impl CachedPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            CachedPayload::Records(_) => "records",
            CachedPayload::Record(_) => "record",
            CachedPayload::Count(_) => "count",
        }
    }

    /// True when this payload has the shape `kind` produces
    pub fn matches_kind(&self, kind: &RequestKind) -> bool {
        matches!(
            (self, kind),
            (CachedPayload::Records(_), RequestKind::List)
                | (CachedPayload::Record(_), RequestKind::Object(_))
                | (CachedPayload::Count(_), RequestKind::Count)
        )
    }

    /// Number of records carried (1 for a single record, 0 for a count)
    pub fn record_count(&self) -> usize {
        match self {
            CachedPayload::Records(records) => records.len(),
            CachedPayload::Record(_) => 1,
            CachedPayload::Count(_) => 0,
        }
    }
}

/// One stored response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: CachedPayload,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// New entry stamped with the current time
    pub fn new(key: CacheKey, payload: CachedPayload) -> Self {
        Self::with_timestamp(key, payload, Utc::now())
    }

    pub fn with_timestamp(key: CacheKey, payload: CachedPayload, stored_at: DateTime<Utc>) -> Self {
        Self {
            key,
            payload,
            stored_at,
        }
    }

    /// An entry is stale once it is strictly older than `max_age`.
    ///
    /// No max age means the entry never goes stale. Entries stamped in the
    /// future (clock skew) count as fresh.
    pub fn is_stale(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(max_age) = max_age else {
            return false;
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return false;
        };
        now.signed_duration_since(self.stored_at) > max_age
    }
}
