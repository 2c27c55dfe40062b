//! CLI module for AeroQuery
//!
//! Provides command-line interface for:
//! - parse: Print the predicate tree of a query
//! - explain: Print the rewritten source tree
//! - query: One-shot query execution
//! - start: Line-delimited JSON query loop over stdin
//! - stale: Staleness check against a refs snapshot

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, IndexArgs, PageArgs};
pub use commands::{explain, parse, query, run, run_command, stale, start};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_response};
