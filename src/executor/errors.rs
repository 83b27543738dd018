//! Execution-time errors
//!
//! Error codes:
//! - OBJQ_CACHE_MISS
//! - OBJQ_NOT_FOUND
//! - OBJQ_TRANSPORT
//! - OBJQ_PAYLOAD_MISMATCH
//! - query error codes, for specs that fail validation at trigger time
//!
//! These are delivered through the same channel as successful results and
//! are scoped to the one execution that produced them.

use thiserror::Error;

use crate::query::QueryError;

use super::transport::TransportError;

/// Result type for query execution
pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    /// Cache-only execution with no usable entry
    #[error("No usable cache entry for {key}")]
    CacheMiss { key: String },

    /// Fetch-by-id with no matching record
    #[error("Object {object_id} not found in {collection}")]
    NotFound {
        collection: String,
        object_id: String,
    },

    /// Collaborator error, surfaced verbatim
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Payload shape does not match the request kind
    #[error("Payload mismatch: expected {expected}, found {found}")]
    PayloadMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
}

impl ExecError {
    pub fn cache_miss(key: impl ToString) -> Self {
        Self::CacheMiss {
            key: key.to_string(),
        }
    }

    pub fn not_found(collection: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            object_id: object_id.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::CacheMiss { .. } => "OBJQ_CACHE_MISS",
            Self::NotFound { .. } => "OBJQ_NOT_FOUND",
            Self::Transport(_) => "OBJQ_TRANSPORT",
            Self::PayloadMismatch { .. } => "OBJQ_PAYLOAD_MISMATCH",
            Self::InvalidQuery(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecError::cache_miss("k").code(), "OBJQ_CACHE_MISS");
        assert_eq!(ExecError::not_found("Post", "x").code(), "OBJQ_NOT_FOUND");
        assert_eq!(
            ExecError::from(TransportError::failed("timeout")).code(),
            "OBJQ_TRANSPORT"
        );
        assert_eq!(
            ExecError::from(QueryError::invalid_range("limit", -1)).code(),
            "OBJQ_INVALID_RANGE"
        );
    }

    #[test]
    fn test_transport_message_kept_verbatim() {
        let err = ExecError::from(TransportError::failed("503 Service Unavailable"));
        assert!(err.to_string().contains("503 Service Unavailable"));
    }
}
