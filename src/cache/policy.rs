//! Cache policies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Strategy deciding whether an execution reads the cache, the network, or both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Always hit the network; never read or write the cache
    #[default]
    IgnoreCache,
    /// Read the cache only; fail with a cache miss if absent or stale
    CacheOnly,
    /// Always hit the network; write the result to the cache
    NetworkOnly,
    /// Read the cache if fresh, else hit the network and cache the result
    CacheElseNetwork,
    /// Hit the network; on failure fall back to any cached entry, stale or not
    NetworkElseCache,
    /// Deliver a cached entry first if present, then always refresh from the network
    CacheThenNetwork,
}

impl CachePolicy {
    pub const ALL: [CachePolicy; 6] = [
        CachePolicy::IgnoreCache,
        CachePolicy::CacheOnly,
        CachePolicy::NetworkOnly,
        CachePolicy::CacheElseNetwork,
        CachePolicy::NetworkElseCache,
        CachePolicy::CacheThenNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::IgnoreCache => "ignore_cache",
            CachePolicy::CacheOnly => "cache_only",
            CachePolicy::NetworkOnly => "network_only",
            CachePolicy::CacheElseNetwork => "cache_else_network",
            CachePolicy::NetworkElseCache => "network_else_cache",
            CachePolicy::CacheThenNetwork => "cache_then_network",
        }
    }

    /// Consults the cache before any network request
    pub fn reads_cache_first(&self) -> bool {
        matches!(
            self,
            CachePolicy::CacheOnly | CachePolicy::CacheElseNetwork | CachePolicy::CacheThenNetwork
        )
    }

    /// May contact the transport
    pub fn uses_network(&self) -> bool {
        !matches!(self, CachePolicy::CacheOnly)
    }

    /// Stores network results in the cache
    pub fn writes_cache(&self) -> bool {
        !matches!(self, CachePolicy::IgnoreCache | CachePolicy::CacheOnly)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown cache policy '{}'", s))
    }
}
