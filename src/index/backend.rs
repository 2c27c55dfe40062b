//! Index backend interface

use std::fmt;

use crate::predicate::{ChangeDocument, Predicate};
use crate::query::{QueryOptions, QueryResult};
use crate::source::ResultStream;

use super::schema::Schema;

/// A secondary index over change documents.
///
/// `search` receives only predicates whose leaves are all fields of
/// `schema()`. It honors `opts.start` and `opts.limit`.
pub trait ChangeIndex: Send + Sync + fmt::Debug {
    /// Fields this index can answer
    fn schema(&self) -> &Schema;

    /// Documents matching an index-answerable predicate
    fn search(
        &self,
        predicate: &Predicate,
        opts: &QueryOptions,
    ) -> QueryResult<ResultStream<ChangeDocument>>;

    /// Like `search`, projected to `opts.requested_fields`
    fn search_raw(
        &self,
        predicate: &Predicate,
        opts: &QueryOptions,
    ) -> QueryResult<ResultStream<ChangeDocument>> {
        let fields = opts.requested_fields.clone();
        Ok(self
            .search(predicate, opts)?
            .map_items(move |doc| doc.project(&fields)))
    }

    /// Estimated number of matches
    fn cardinality(&self, predicate: &Predicate) -> usize;
}
