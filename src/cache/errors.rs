//! Cache persistence errors
//!
//! Error codes:
//! - OBJQ_CACHE_IO
//! - OBJQ_CACHE_SERIALIZATION
//! - OBJQ_CACHE_CORRUPTED
//! - OBJQ_CACHE_UNSUPPORTED_VERSION
//!
//! The in-memory store itself never fails; only snapshot I/O does.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for cache persistence
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache snapshot I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Checksum mismatch or malformed entry
    #[error("Cache snapshot corrupted: {0}")]
    Corrupted(String),

    #[error("Unsupported cache snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl CacheError {
    pub fn io_at_path(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted(reason.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "OBJQ_CACHE_IO",
            Self::Serialization(_) => "OBJQ_CACHE_SERIALIZATION",
            Self::Corrupted(_) => "OBJQ_CACHE_CORRUPTED",
            Self::UnsupportedVersion { .. } => "OBJQ_CACHE_UNSUPPORTED_VERSION",
        }
    }
}
