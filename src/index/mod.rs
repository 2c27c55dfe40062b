//! Change index subsystem for aeroquery
//!
//! The index is the only component that performs I/O. Everything above it
//! works on predicate and source trees.
//!
//! # Design Principles
//!
//! - Schema-driven: the running schema decides what the index answers
//! - Bounded: every query is checked against `IndexConfig` limits
//! - Deterministic: backends return results in a stable order
//!
//! # Invariants
//!
//! - `ChangeIndex::search` only receives schema fields, never `limit:`
//! - Rewriting never touches the index; reads happen on the first pull

mod backend;
mod config;
mod memory;
mod rewriter;
mod schema;

pub use backend::ChangeIndex;
pub use config::IndexConfig;
pub use memory::MemoryIndex;
pub use rewriter::IndexRewriter;
pub use schema::Schema;
