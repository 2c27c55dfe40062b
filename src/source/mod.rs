//! Lazy composite data sources
//!
//! A rewritten query is a tree of [`Source`] nodes. Nodes that can produce
//! documents on their own implement [`DataSource`]; every node can decide
//! membership of a single document through [`Matchable`].
//!
//! # Invariants
//!
//! - `read()` never touches the index, not even for estimates; work
//!   starts on the first pull
//! - An OR source only has data-source children
//! - An AND source is a data source iff at least one child is
//! - AND evaluates children in ascending cost and stops at the first miss

mod and;
mod explain;
mod indexed;
mod or;
mod stream;

pub use and::AndSource;
pub use explain::Explain;
pub use indexed::IndexedQuery;
pub use or::OrSource;
pub use stream::ResultStream;

use std::fmt;
use std::sync::Arc;

use crate::predicate::{ChangeDocument, Matchable, Predicate};
use crate::query::{QueryError, QueryResult};

/// A node that can enumerate its own results.
pub trait DataSource: Matchable {
    /// Estimated number of results
    fn cardinality(&self) -> usize;

    /// Full documents, lazily
    fn read(&self) -> QueryResult<ResultStream<ChangeDocument>>;

    /// Documents projected to the requested fields, lazily
    fn read_raw(&self) -> QueryResult<ResultStream<ChangeDocument>>;
}

/// Node of a rewritten query
#[derive(Debug, Clone)]
pub enum Source {
    /// Sub-tree answered by the index in one call
    Indexed(Arc<IndexedQuery>),
    And(Arc<AndSource>),
    Or(Arc<OrSource>),
    /// Residual predicate evaluated in memory
    Filter(Predicate),
    /// Caller-supplied matcher evaluated in memory
    Matcher(Arc<dyn Matchable>),
}

impl Source {
    pub fn and(children: Vec<Source>) -> Source {
        Source::And(Arc::new(AndSource::new(children)))
    }

    pub fn or(children: Vec<Source>) -> QueryResult<Source> {
        Ok(Source::Or(Arc::new(OrSource::new(children)?)))
    }

    /// Data-source view of this node, if it has one
    pub fn as_data_source(&self) -> Option<&dyn DataSource> {
        match self {
            Source::Indexed(q) => Some(q.as_ref()),
            Source::And(a) if a.has_data_source() => Some(a.as_ref()),
            Source::Or(o) => Some(o.as_ref()),
            _ => None,
        }
    }

    pub fn is_data_source(&self) -> bool {
        self.as_data_source().is_some()
    }

    pub fn children(&self) -> &[Source] {
        match self {
            Source::And(a) => a.children(),
            Source::Or(o) => o.children(),
            _ => &[],
        }
    }

    /// Cardinality if this is a data source
    pub fn cardinality(&self) -> Option<usize> {
        self.as_data_source().map(|ds| ds.cardinality())
    }

    pub fn read(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        self.data_source()?.read()
    }

    pub fn read_raw(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        self.data_source()?.read_raw()
    }

    fn data_source(&self) -> QueryResult<&dyn DataSource> {
        self.as_data_source()
            .ok_or_else(|| QueryError::source_contract(format!("not a data source: {}", self)))
    }
}

impl Matchable for Source {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        match self {
            Source::Indexed(q) => q.matches(doc),
            Source::And(a) => a.matches(doc),
            Source::Or(o) => o.matches(doc),
            Source::Filter(p) => p.matches(doc),
            Source::Matcher(m) => m.matches(doc),
        }
    }

    fn cost(&self) -> u32 {
        match self {
            Source::Indexed(q) => q.cost(),
            Source::And(a) => a.cost(),
            Source::Or(o) => o.cost(),
            Source::Filter(p) => p.cost(),
            Source::Matcher(m) => m.cost(),
        }
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Source::Indexed(a), Source::Indexed(b)) => a == b,
            (Source::And(a), Source::And(b)) => a.children() == b.children(),
            (Source::Or(a), Source::Or(b)) => a.children() == b.children(),
            (Source::Filter(a), Source::Filter(b)) => a == b,
            (Source::Matcher(a), Source::Matcher(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Source]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Indexed(q) => write!(f, "index({})", q.predicate()),
            Source::And(a) => write_list(f, "and", a.children()),
            Source::Or(o) => write_list(f, "or", o.children()),
            Source::Filter(p) => write!(f, "{}", p),
            Source::Matcher(m) => write!(f, "{:?}", m),
        }
    }
}
