//! aeroquery - query rewriting and execution over a change index
//!
//! Query text is parsed into a predicate tree, rewritten so the index
//! answers as much of it as the running schema allows, and evaluated
//! lazily. Indexed documents can be checked for staleness against the live
//! ref store.

pub mod cli;
pub mod index;
pub mod observability;
pub mod predicate;
pub mod query;
pub mod source;
pub mod staleness;
