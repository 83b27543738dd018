//! Query construction for objquery
//!
//! Application code builds a `QuerySpec` by attaching constraints and
//! combinators, then sets ordering, paging, projection and cache policy.
//!
//! # Composition
//!
//! - Bare constraints in one set are joined by implicit AND
//! - `and_combine` / `or_combine` nest whole constraint sets
//! - Sub-queries are embedded by value at build time
//!
//! # Outputs
//!
//! - `SerializedQuery`: the wire form handed to the transport
//! - `Fingerprint`: the cache key derived from the query's shape

mod constraint;
mod constraint_set;
mod errors;
mod fingerprint;
mod serialize;
mod spec;

pub use constraint::Constraint;
pub use constraint_set::{Combinator, ConstraintBuilder, ConstraintItem, ConstraintSet};
pub use errors::{QueryError, QueryResult};
pub use fingerprint::{canonical_document, Fingerprint};
pub use serialize::SerializedQuery;
pub use spec::{QuerySpec, SortDirection, SortSpec, USER_COLLECTION};
