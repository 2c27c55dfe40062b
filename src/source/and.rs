//! Conjunction of sources

use crate::predicate::{ChangeDocument, Matchable};
use crate::query::{QueryError, QueryResult};

use super::indexed::project;
use super::stream::ResultStream;
use super::{DataSource, Source};

type Items = Box<dyn Iterator<Item = QueryResult<ChangeDocument>> + Send>;

/// AND over sources.
///
/// Reads from the data-source child with the smallest cardinality and
/// filters its results through the remaining children. When that child is
/// an index query, windows emptied by the filters are refilled from the
/// index until enough documents match or the index runs out. The driver is
/// chosen on the first pull, so `read()` itself never consults the index.
#[derive(Debug)]
pub struct AndSource {
    children: Vec<Source>,
    /// Child indexes in ascending cost; ties keep original order
    by_cost: Vec<usize>,
}

impl AndSource {
    pub fn new(children: Vec<Source>) -> Self {
        let mut by_cost: Vec<usize> = (0..children.len()).collect();
        by_cost.sort_by_key(|&i| children[i].cost());
        Self { children, by_cost }
    }

    pub fn children(&self) -> &[Source] {
        &self.children
    }

    pub fn has_data_source(&self) -> bool {
        self.children.iter().any(Source::is_data_source)
    }

    /// Filters read full documents; projection, if any, happens after matching
    fn filtered(&self, raw: bool) -> QueryResult<ResultStream<ChangeDocument>> {
        if !self.has_data_source() {
            let children: Vec<String> = self.children.iter().map(Source::to_string).collect();
            return Err(QueryError::source_contract(format!(
                "no data source among AND children: {}",
                children.join(", ")
            )));
        }
        let children = self.children.clone();
        let by_cost = self.by_cost.clone();
        Ok(ResultStream::lazy(move || open(children, by_cost, raw)))
    }
}

/// Index of the child results are read from
fn driver(children: &[Source]) -> Option<usize> {
    children
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.cardinality().map(|n| (n, i)))
        .min()
        .map(|(_, i)| i)
}

fn open(children: Vec<Source>, by_cost: Vec<usize>, raw: bool) -> QueryResult<Items> {
    let driver_index = driver(&children)
        .ok_or_else(|| QueryError::source_contract("no data source among AND children"))?;
    let driver = children[driver_index].clone();
    let rest: Vec<Source> = by_cost
        .iter()
        .filter(|&&i| i != driver_index)
        .map(|&i| children[i].clone())
        .collect();
    let fields = if raw {
        requested_fields(&driver)
    } else {
        Vec::new()
    };

    if let Source::Indexed(query) = &driver {
        return Ok(Box::new(query.windows(false, rest, fields)));
    }

    let stream = driver.read()?;
    Ok(Box::new(stream.filter_map(move |item| match item {
        Ok(doc) if rest.iter().all(|c| c.matches(&doc)) => Some(Ok(project(doc, &fields))),
        Ok(_) => None,
        Err(e) => Some(Err(e)),
    })))
}

/// Fields requested by the index queries under `source`
fn requested_fields(source: &Source) -> Vec<String> {
    match source {
        Source::Indexed(q) => q.options().requested_fields.clone(),
        _ => source
            .children()
            .iter()
            .map(requested_fields)
            .find(|fields| !fields.is_empty())
            .unwrap_or_default(),
    }
}

impl Matchable for AndSource {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        self.by_cost.iter().all(|&i| self.children[i].matches(doc))
    }

    fn cost(&self) -> u32 {
        self.children
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.cost()))
    }
}

impl DataSource for AndSource {
    fn cardinality(&self) -> usize {
        self.children
            .iter()
            .filter_map(Source::cardinality)
            .min()
            .unwrap_or(0)
    }

    fn read(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        self.filtered(false)
    }

    fn read_raw(&self) -> QueryResult<ResultStream<ChangeDocument>> {
        self.filtered(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{OperatorPredicate, Predicate};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Counting {
        cost: u32,
        answer: bool,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new(cost: u32, answer: bool) -> Arc<Self> {
            Arc::new(Self {
                cost,
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Matchable for Counting {
        fn matches(&self, _doc: &ChangeDocument) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }

        fn cost(&self) -> u32 {
            self.cost
        }
    }

    #[test]
    fn test_match_runs_cheapest_first_and_short_circuits() {
        let expensive = Counting::new(10, true);
        let cheap_miss = Counting::new(1, false);
        let and = AndSource::new(vec![
            Source::Matcher(expensive.clone()),
            Source::Matcher(cheap_miss.clone()),
        ]);

        assert!(!and.matches(&ChangeDocument::new(1, json!({}))));
        assert_eq!(cheap_miss.calls.load(Ordering::SeqCst), 1);
        assert_eq!(expensive.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_and_without_data_source() {
        let and = AndSource::new(vec![Source::Filter(Predicate::operator(
            OperatorPredicate::exact("file", "a"),
        ))]);
        assert!(!and.has_data_source());
        let err = and.read().unwrap_err();
        assert!(err.is_fatal());
    }
}
