//! CLI module for objquery
//!
//! Provides:
//! - explain: fingerprint and wire form of a JSON query
//! - cache inspect: list a persisted cache snapshot
//! - cache clear: empty a persisted cache snapshot

mod args;
mod commands;
mod errors;
mod io;

pub use args::{CacheAction, Cli, Command};
pub use commands::{cache_clear, cache_inspect, explain, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
