//! Predicate trees
//!
//! Immutable boolean trees over operator leaves. Trees are shared through
//! `Arc`, so cloning is cheap and sub-trees can appear in several places.
//!
//! # Invariants
//!
//! - Children are never mutated after construction; `copy` builds a new node
//! - Equality and hashing are structural
//! - `not(not(p))` is `p` itself
//! - A NOT node has exactly one child; leaves have none

mod document;
mod operator;
mod tree;

pub use document::ChangeDocument;
pub use operator::{ChangeStatus, Matchable, Operand, OperatorPredicate};
pub use tree::{Predicate, PredicateKind};
