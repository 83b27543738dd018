//! CLI argument definitions using clap
//!
//! Commands:
//! - objquery explain --query <file>
//! - objquery cache inspect --file <snapshot>
//! - objquery cache clear --file <snapshot>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// objquery - query construction and response cache tooling
#[derive(Parser, Debug)]
#[command(name = "objquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a JSON query and print its fingerprint and wire form
    Explain {
        /// Path to a JSON-encoded query
        #[arg(long)]
        query: PathBuf,
    },

    /// Inspect or clear a persisted cache snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List the entries of a snapshot
    Inspect {
        /// Path to the snapshot file
        #[arg(long)]
        file: PathBuf,
    },

    /// Rewrite a snapshot with no entries
    Clear {
        /// Path to the snapshot file
        #[arg(long)]
        file: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
