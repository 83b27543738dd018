//! objquery - query construction and response caching for remote object stores
//!
//! Build a [`query::QuerySpec`] from constraints, then run it through an
//! [`executor::QueryExecutor`] whose cache policy decides between the local
//! [`cache::CacheStore`] and the injected [`executor::Transport`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod executor;
pub mod observability;
pub mod query;
pub mod value;
