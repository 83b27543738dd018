//! CLI command implementations
//!
//! Each command builds a JSON value; `run_command` wraps it in the output
//! envelope. Commands do not log, so stdout carries only the response.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::cache::{read_snapshot, write_snapshot, CacheEntry};
use crate::query::QuerySpec;

use super::args::{CacheAction, Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point.
///
/// Parses arguments, runs the command and writes the response. Failures are
/// written as an error envelope and returned so the process exits non-zero.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = write_error(e.code(), &e.to_string());
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Explain { query } => explain(&query)?,
        Command::Cache { action } => match action {
            CacheAction::Inspect { file } => cache_inspect(&file)?,
            CacheAction::Clear { file } => cache_clear(&file)?,
        },
    };
    write_response(data)
}

/// Reads a JSON query, validates it and returns its fingerprint and wire form
pub fn explain(query_path: &Path) -> CliResult<Value> {
    let content =
        fs::read_to_string(query_path).map_err(|e| CliError::io_at_path(query_path, e))?;
    let spec: QuerySpec = serde_json::from_str(&content)
        .map_err(|e| CliError::invalid_input(format!("Invalid query JSON: {}", e)))?;
    spec.validate()?;

    Ok(json!({
        "fingerprint": spec.fingerprint(),
        "query": spec.to_serialized(),
    }))
}

fn describe_entry(entry: &CacheEntry) -> Value {
    json!({
        "fingerprint": entry.key.fingerprint,
        "kind": entry.key.kind,
        "stored_at": entry.stored_at.to_rfc3339(),
        "payload_type": entry.payload.type_name(),
        "records": entry.payload.record_count(),
    })
}

/// Lists the entries of a snapshot
pub fn cache_inspect(file: &Path) -> CliResult<Value> {
    let entries = read_snapshot(file)?;
    Ok(json!({
        "file": file.display().to_string(),
        "count": entries.len(),
        "entries": entries.iter().map(describe_entry).collect::<Vec<_>>(),
    }))
}

/// Rewrites a snapshot with no entries.
///
/// A snapshot that fails verification is still cleared; `removed` is then
/// null since its content cannot be trusted.
pub fn cache_clear(file: &Path) -> CliResult<Value> {
    let removed = if file.exists() {
        read_snapshot(file).ok().map(|entries| entries.len())
    } else {
        Some(0)
    };
    write_snapshot(file, &[])?;

    Ok(json!({
        "file": file.display().to_string(),
        "removed": removed,
    }))
}
