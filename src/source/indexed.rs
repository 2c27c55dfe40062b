//! Index-backed leaf source

use std::sync::Arc;

use crate::index::ChangeIndex;
use crate::predicate::{ChangeDocument, Matchable, Predicate};
use crate::query::{QueryOptions, QueryResult};

use super::stream::ResultStream;
use super::{DataSource, Source};

/// A predicate sub-tree the index answers.
///
/// Keeps two option sets: `options` is what the caller asked for, while
/// `backend_options` starts at 0 and asks for `start + limit` results
/// (capped by the backend maximum) so the caller can skip `start` itself.
/// When the cap is below `start + limit`, reads continue with further
/// windows of the same size.
#[derive(Debug, Clone)]
pub struct IndexedQuery {
    index: Arc<dyn ChangeIndex>,
    predicate: Predicate,
    options: QueryOptions,
    backend_options: QueryOptions,
}

impl IndexedQuery {
    pub fn new(
        index: Arc<dyn ChangeIndex>,
        predicate: Predicate,
        options: &QueryOptions,
        max_limit: usize,
    ) -> Self {
        Self {
            index,
            predicate,
            options: options.clone(),
            backend_options: options.convert_for_backend(max_limit),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Options as requested by the caller
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Options sent to the backend
    pub fn backend_options(&self) -> &QueryOptions {
        &self.backend_options
    }

    /// Semantic limit, before start inflation
    pub fn limit(&self) -> usize {
        self.options.limit
    }

    /// Limit passed to the backend
    pub fn backend_limit(&self) -> usize {
        self.backend_options.limit
    }

    /// Results a full read delivers: `start + limit` of the caller's options
    pub fn wanted(&self) -> usize {
        self.options.start.saturating_add(self.options.limit)
    }

    /// One backend window of `backend_limit` results starting at `start`
    pub fn read_at(&self, start: usize, raw: bool) -> ResultStream<ChangeDocument> {
        let index = Arc::clone(&self.index);
        let predicate = self.predicate.clone();
        let mut options = self.backend_options.clone();
        options.start = start;
        ResultStream::lazy(move || {
            if raw {
                index.search_raw(&predicate, &options)
            } else {
                index.search(&predicate, &options)
            }
        })
    }

    /// Successive windows, keeping only documents every filter accepts.
    ///
    /// Stops after `wanted()` accepted documents or at the first short
    /// window. Filters see full documents; `fields` projects afterwards.
    pub(super) fn windows(
        &self,
        raw: bool,
        filters: Vec<Source>,
        fields: Vec<String>,
    ) -> Windows {
        Windows {
            query: self.clone(),
            raw,
            filters,
            fields,
            delivered: 0,
            offset: self.backend_options.start,
            in_window: 0,
            current: None,
            exhausted: false,
        }
    }
}

/// Iterator over an index query's windows
pub(super) struct Windows {
    query: IndexedQuery,
    raw: bool,
    filters: Vec<Source>,
    fields: Vec<String>,
    delivered: usize,
    offset: usize,
    in_window: usize,
    current: Option<ResultStream<ChangeDocument>>,
    exhausted: bool,
}

impl Iterator for Windows {
    type Item = QueryResult<ChangeDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        let page_size = self.query.backend_limit();
        loop {
            if self.exhausted || page_size == 0 || self.delivered >= self.query.wanted() {
                return None;
            }
            let (offset, raw) = (self.offset, self.raw);
            let query = &self.query;
            let stream = self
                .current
                .get_or_insert_with(|| query.read_at(offset, raw));
            match stream.next() {
                Some(Ok(doc)) => {
                    self.in_window += 1;
                    if self.filters.iter().all(|f| f.matches(&doc)) {
                        self.delivered += 1;
                        return Some(Ok(project(doc, &self.fields)));
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    stream.close();
                    self.current = None;
                    if self.in_window < page_size {
                        self.exhausted = true;
                        return None;
                    }
                    self.offset += self.in_window;
                    self.in_window = 0;
                }
            }
        }
    }
}

pub(super) fn project(doc: ChangeDocument, fields: &[String]) -> ChangeDocument {
    if fields.is_empty() {
        doc
    } else {
        doc.project(fields)
    }
}

impl PartialEq for IndexedQuery {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate
            && self.options == other.options
            && self.backend_options == other.backend_options
    }
}

impl Matchable for IndexedQuery {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        self.predicate.matches(doc)
    }

    fn cost(&self) -> u32 {
        self.predicate.cost()
    }
}

impl DataSource for IndexedQuery {
    fn cardinality(&self) -> usize {
        self.index.cardinality(&self.predicate)
    }

    fn read(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        let windows = self.windows(false, Vec::new(), Vec::new());
        Ok(ResultStream::lazy(move || Ok(windows)))
    }

    fn read_raw(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        let windows = self.windows(true, Vec::new(), Vec::new());
        Ok(ResultStream::lazy(move || Ok(windows)))
    }
}
