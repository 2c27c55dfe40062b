//! Query subsystem for aeroquery
//!
//! Parses change query text into predicate trees and runs them against an
//! index through the rewriter.
//!
//! # Pipeline
//!
//! 1. `ChangeQueryBuilder::parse` builds the predicate tree
//! 2. `QueryProcessor` resolves the effective limit and paging window
//! 3. `IndexRewriter` turns the tree into lazy sources
//! 4. The processor pulls one page plus one probe result
//!
//! All errors carry a stable code; rejections never reach the index.

mod builder;
mod errors;
mod options;
mod parser;
mod processor;

pub use builder::{ChangeQueryBuilder, OperatorFactory};
pub use errors::{QueryError, QueryErrorCode, QueryResult, Severity};
pub use options::QueryOptions;
pub use processor::{QueryPage, QueryProcessor};
