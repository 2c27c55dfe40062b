//! Disjunction of data sources

use std::collections::HashSet;

use crate::predicate::{ChangeDocument, Matchable};
use crate::query::{QueryError, QueryResult};

use super::stream::ResultStream;
use super::{DataSource, Source};

/// OR over data sources. Results are the concatenation of each child's
/// results with repeated document ids dropped.
#[derive(Debug)]
pub struct OrSource {
    children: Vec<Source>,
}

impl OrSource {
    /// Fails with a fatal contract error if any child cannot be read.
    pub fn new(children: Vec<Source>) -> QueryResult<Self> {
        if let Some(bad) = children.iter().find(|c| !c.is_data_source()) {
            return Err(QueryError::source_contract(format!(
                "OR child is not a data source: {}",
                bad
            )));
        }
        Ok(Self { children })
    }

    pub fn children(&self) -> &[Source] {
        &self.children
    }

    fn union(&self, raw: bool) -> ResultStream<ChangeDocument> {
        let children = self.children.clone();
        ResultStream::lazy(move || {
            let mut seen = HashSet::new();
            let items = children
                .into_iter()
                .flat_map(move |child| {
                    let stream = if raw { child.read_raw() } else { child.read() };
                    stream.unwrap_or_else(ResultStream::failed)
                })
                .filter(move |item| match item {
                    Ok(doc) => seen.insert(doc.id),
                    Err(_) => true,
                });
            Ok(items)
        })
    }
}

impl Matchable for OrSource {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        let mut order: Vec<&Source> = self.children.iter().collect();
        order.sort_by_key(|c| c.cost());
        order.into_iter().any(|c| c.matches(doc))
    }

    fn cost(&self) -> u32 {
        self.children
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.cost()))
    }
}

impl DataSource for OrSource {
    fn cardinality(&self) -> usize {
        self.children
            .iter()
            .filter_map(Source::cardinality)
            .fold(0usize, usize::saturating_add)
    }

    fn read(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        Ok(self.union(false))
    }

    fn read_raw(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        Ok(self.union(true))
    }
}
