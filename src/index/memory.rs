//! In-memory index backend
//!
//! Holds documents in a `BTreeMap` keyed by id. Results are ordered by
//! `updated` descending, then id descending, so output is deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::predicate::{ChangeDocument, Matchable, Predicate, PredicateKind};
use crate::query::{QueryError, QueryOptions, QueryResult};
use crate::source::ResultStream;

use super::backend::ChangeIndex;
use super::schema::Schema;

/// Reference `ChangeIndex` over documents held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    schema: Schema,
    documents: BTreeMap<u64, ChangeDocument>,
}

impl MemoryIndex {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            documents: BTreeMap::new(),
        }
    }

    /// Load documents from a JSON array file
    pub fn load(path: &Path, schema: Schema) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config_invalid(format!("Failed to read documents: {}", e)))?;
        let documents: Vec<ChangeDocument> = serde_json::from_str(&content)
            .map_err(|e| QueryError::config_invalid(format!("Invalid documents JSON: {}", e)))?;

        let mut index = Self::new(schema);
        for doc in documents {
            index.insert(doc);
        }
        Ok(index)
    }

    /// Adds or replaces a document
    pub fn insert(&mut self, doc: ChangeDocument) {
        self.documents.insert(doc.id, doc);
    }

    pub fn remove(&mut self, id: u64) -> Option<ChangeDocument> {
        self.documents.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Rejects predicates the schema cannot answer
    fn check_supported(&self, predicate: &Predicate) -> QueryResult<()> {
        match predicate.kind() {
            PredicateKind::Operator(op) => {
                if op.is_limit() || !self.schema.has_field(op.field()) {
                    return Err(QueryError::index_failed(format!(
                        "Unsupported index predicate: {}",
                        predicate
                    )));
                }
                Ok(())
            }
            _ => predicate
                .children()
                .iter()
                .try_for_each(|child| self.check_supported(child)),
        }
    }

    fn matching(&self, predicate: &Predicate) -> Vec<&ChangeDocument> {
        let mut out: Vec<&ChangeDocument> = self
            .documents
            .values()
            .filter(|doc| predicate.matches(doc))
            .collect();
        out.sort_by(|a, b| b.updated().cmp(&a.updated()).then(b.id.cmp(&a.id)));
        out
    }
}

impl ChangeIndex for MemoryIndex {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn search(
        &self,
        predicate: &Predicate,
        opts: &QueryOptions,
    ) -> QueryResult<ResultStream<ChangeDocument>> {
        self.check_supported(predicate)?;
        let docs = self
            .matching(predicate)
            .into_iter()
            .skip(opts.start)
            .take(opts.limit)
            .cloned()
            .collect();
        Ok(ResultStream::from_vec(docs))
    }

    fn cardinality(&self, predicate: &Predicate) -> usize {
        match self.check_supported(predicate) {
            Ok(()) => self.matching(predicate).len(),
            Err(_) => 0,
        }
    }
}
