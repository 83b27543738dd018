//! Build-time query errors
//!
//! Error codes:
//! - OBJQ_INVALID_CONSTRAINT
//! - OBJQ_INVALID_COLLECTION_NAME
//! - OBJQ_INVALID_RANGE
//!
//! All of these are reported synchronously at the offending builder call.

use thiserror::Error;

/// Result type for query construction
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building a query
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Malformed key, value, geo point or combinator
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// Empty collection name
    #[error("Invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// Negative pagination value
    #[error("Invalid range: {field} must be >= 0, got {value}")]
    InvalidRange { field: &'static str, value: i64 },
}

impl QueryError {
    /// Create an invalid constraint error
    pub fn invalid_constraint(reason: impl Into<String>) -> Self {
        Self::InvalidConstraint(reason.into())
    }

    /// Create an invalid collection name error
    pub fn invalid_collection_name(name: impl Into<String>) -> Self {
        Self::InvalidCollectionName(name.into())
    }

    /// Create an invalid range error
    pub fn invalid_range(field: &'static str, value: i64) -> Self {
        Self::InvalidRange { field, value }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConstraint(_) => "OBJQ_INVALID_CONSTRAINT",
            Self::InvalidCollectionName(_) => "OBJQ_INVALID_COLLECTION_NAME",
            Self::InvalidRange { .. } => "OBJQ_INVALID_RANGE",
        }
    }
}
