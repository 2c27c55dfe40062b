//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery parse <QUERY>
//! - aeroquery explain [--config <path>] [--schema <path>] <QUERY>
//! - aeroquery query --docs <path> [--start N] [--limit N] <QUERY>
//! - aeroquery start --docs <path>
//! - aeroquery stale --docs <path> --refs <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// AeroQuery - change query rewriting and execution
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log verbosity: -v for info, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the index comes from
#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {
    /// Path to index configuration file (defaults apply if omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to schema feed (latest built-in schema if omitted)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// JSON array of change documents to load into the in-memory index
    #[arg(long)]
    pub docs: Option<PathBuf>,
}

/// Paging window for one query
#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Results to skip
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start: i64,

    /// Results per page (0 uses the configured default)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Return every result
    #[arg(long)]
    pub no_limit: bool,

    /// Comma-separated fields to project results to
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a query and print its predicate tree
    Parse {
        /// Query text
        query: String,
    },

    /// Show how a query is rewritten against the index
    Explain {
        #[command(flatten)]
        index: IndexArgs,

        #[command(flatten)]
        page: PageArgs,

        /// Query text
        query: String,
    },

    /// Execute a single query and exit
    Query {
        #[command(flatten)]
        index: IndexArgs,

        #[command(flatten)]
        page: PageArgs,

        /// Query text
        query: String,
    },

    /// Read JSON query requests from stdin, one per line
    Start {
        #[command(flatten)]
        index: IndexArgs,
    },

    /// Report which documents are stale against a refs snapshot
    Stale {
        /// JSON array of change documents
        #[arg(long)]
        docs: PathBuf,

        /// JSON object mapping project to ref name to sha1
        #[arg(long)]
        refs: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
