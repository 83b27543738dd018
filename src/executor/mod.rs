//! Query execution
//!
//! `QueryExecutor` walks each execution through an explicit state machine:
//!
//! ```text
//! Idle -> FingerprintComputed -> CacheConsulted
//!      -> {CacheSatisfied | NetworkPending}
//!      -> {Completed | Failed}
//! ```
//!
//! The query's cache policy decides which path is taken. The transport
//! is an injected collaborator; the cache store is injected too, defaulting
//! to the process-wide one.
//!
//! Three request kinds share the machine: fetch-list, fetch-by-id and count.

mod delivery;
mod errors;
mod executor;
mod state;
mod transport;

pub use delivery::{Deliveries, Delivery, ResultShape, Source};
pub use errors::{ExecError, ExecResult};
pub use executor::{ExecutorConfig, QueryExecutor};
pub use state::{ExecutionState, ExecutionTrace};
pub use transport::{Transport, TransportError, TransportFuture};
