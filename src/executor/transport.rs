//! Transport collaborator
//!
//! The network layer is not part of this crate. Embedders implement
//! `Transport` over whatever HTTP client and authentication they use; any
//! timeout or retry belongs to that implementation.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::cache::Record;
use crate::query::SerializedQuery;

/// Boxed future returned by transport calls
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote side has no matching object
    #[error("object not found")]
    NotFound,

    /// Network failure, rejected request, remote validation error
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Remote object store operations consumed by the executor
pub trait Transport: Send + Sync {
    /// Fetch one record by id
    fn fetch_by_id<'a>(
        &'a self,
        collection: &'a str,
        object_id: &'a str,
    ) -> TransportFuture<'a, Record>;

    /// Fetch the records matching `query`, in remote order
    fn fetch_list<'a>(&'a self, query: &'a SerializedQuery) -> TransportFuture<'a, Vec<Record>>;

    /// Count the records matching `query`
    fn count<'a>(&'a self, query: &'a SerializedQuery) -> TransportFuture<'a, u64>;
}
