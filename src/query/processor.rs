//! Query processor
//!
//! Resolves the effective limit for a query, rewrites it against the index
//! and pages through the resulting source.
//!
//! # Limit resolution
//!
//! The smallest of these wins:
//!
//! - the limit the caller is permitted
//! - the backend maximum (`IndexConfig::max_limit`)
//! - the caller-provided limit, or `IndexConfig::default_limit` if unset
//! - the smallest `limit:N` in the query
//!
//! `no_limit` bypasses all of them.
//!
//! # Paging
//!
//! One extra result past the limit is requested to learn whether another
//! page exists. The backend is asked for `start + limit + 1` results from
//! offset 0, in windows of at most `IndexConfig::max_limit`, and the
//! processor skips `start` itself. Under `no_limit` windows are read until
//! the index runs out.

use std::sync::Arc;

use serde::Serialize;

use crate::index::IndexRewriter;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::predicate::{ChangeDocument, Predicate};
use crate::source::Source;

use super::builder::ChangeQueryBuilder;
use super::errors::{QueryError, QueryResult};
use super::options::QueryOptions;

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage {
    /// Query text as received, or the predicate's display form
    pub query: String,
    #[serde(skip_serializing)]
    pub predicate: Predicate,
    /// Effective limit the page was cut at
    pub limit: usize,
    pub documents: Vec<ChangeDocument>,
    /// True if at least one more result exists past this page
    pub more: bool,
}

/// Per-request query execution state
#[derive(Debug)]
pub struct QueryProcessor {
    builder: ChangeQueryBuilder,
    rewriter: IndexRewriter,
    metrics: Arc<MetricsRegistry>,
    permitted_limit: usize,
    user_provided_limit: usize,
    no_limit: bool,
    start: i64,
    requested_fields: Vec<String>,
}

impl QueryProcessor {
    pub fn new(builder: ChangeQueryBuilder, rewriter: IndexRewriter) -> Self {
        Self {
            builder,
            rewriter,
            metrics: Arc::new(MetricsRegistry::new()),
            permitted_limit: usize::MAX,
            user_provided_limit: 0,
            no_limit: false,
            start: 0,
            requested_fields: Vec::new(),
        }
    }

    /// Shares a metrics registry with other components
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn rewriter(&self) -> &IndexRewriter {
        &self.rewriter
    }

    pub fn builder(&self) -> &ChangeQueryBuilder {
        &self.builder
    }

    /// Upper bound granted to the caller
    pub fn set_permitted_limit(&mut self, limit: usize) -> &mut Self {
        self.permitted_limit = limit;
        self
    }

    /// Limit requested by the caller; 0 means unset
    pub fn set_user_provided_limit(&mut self, limit: usize) -> &mut Self {
        self.user_provided_limit = limit;
        self
    }

    pub fn set_no_limit(&mut self, no_limit: bool) -> &mut Self {
        self.no_limit = no_limit;
        self
    }

    pub fn set_start(&mut self, start: i64) -> &mut Self {
        self.start = start;
        self
    }

    /// Fields to project results to; empty returns full documents
    pub fn set_requested_fields(&mut self, fields: Vec<String>) -> &mut Self {
        self.requested_fields = fields;
        self
    }

    pub fn get_effective_limit(&self, p: &Predicate) -> usize {
        if self.no_limit {
            return usize::MAX;
        }
        let config = self.rewriter.config();
        let requested = if self.user_provided_limit > 0 {
            self.user_provided_limit
        } else {
            config.default_limit
        };
        let mut limit = self.permitted_limit.min(config.max_limit).min(requested);
        if let Some(query_limit) = p.min_limit() {
            limit = limit.min(query_limit);
        }
        limit
    }

    /// Parses and runs one query
    pub fn query(&self, text: &str) -> QueryResult<QueryPage> {
        log_event_with_fields(Event::QueryReceived, &[("query", text)]);
        let result = self
            .builder
            .parse(text)
            .and_then(|p| self.execute(text.to_string(), p));
        self.record(text, result)
    }

    /// Runs an already parsed predicate
    pub fn query_predicate(&self, p: &Predicate) -> QueryResult<QueryPage> {
        let text = p.to_string();
        log_event_with_fields(Event::QueryReceived, &[("query", text.as_str())]);
        let result = self.execute(text.clone(), p.clone());
        self.record(&text, result)
    }

    /// Runs several queries in order, stopping at the first failure
    pub fn query_many(&self, queries: &[&str]) -> QueryResult<Vec<QueryPage>> {
        queries.iter().map(|q| self.query(q)).collect()
    }

    /// Rewrites without reading; used to explain a query
    pub fn plan(&self, p: &Predicate) -> QueryResult<Source> {
        let (start, limit) = self.window(p)?;
        self.rewriter.rewrite(p, &self.options(start, limit))
    }

    /// Validated `(start, limit)` for a predicate
    fn window(&self, p: &Predicate) -> QueryResult<(usize, usize)> {
        if self.start < 0 {
            return Err(QueryError::parse(
                "'start' parameter cannot be less than zero",
            ));
        }
        let start = usize::try_from(self.start)
            .map_err(|_| QueryError::invalid_argument("'start' parameter is too large"))?;

        let config = self.rewriter.config();
        let mut limit = self.get_effective_limit(p);
        if limit == config.max_limit && limit > 1 {
            limit -= 1;
        }
        if limit > 0 {
            let page = start / limit + 1;
            if page > config.max_pages {
                return Err(QueryError::parse(format!(
                    "Cannot go beyond page {} of results",
                    config.max_pages
                )));
            }
        }
        Ok((start, limit))
    }

    fn options(&self, start: usize, limit: usize) -> QueryOptions {
        QueryOptions::new(start, limit.saturating_add(1))
            .with_fields(self.requested_fields.clone())
    }

    fn execute(&self, query: String, predicate: Predicate) -> QueryResult<QueryPage> {
        let (start, limit) = self.window(&predicate)?;
        if limit == 0 {
            return Ok(QueryPage {
                query,
                predicate,
                limit,
                documents: Vec::new(),
                more: false,
            });
        }

        let source = self
            .rewriter
            .rewrite(&predicate, &self.options(start, limit))?;
        let mut stream = if self.requested_fields.is_empty() {
            source.read()?
        } else {
            source.read_raw()?
        };

        let mut documents = Vec::new();
        let mut skipped = 0;
        let probe = limit.saturating_add(1);
        while documents.len() < probe {
            match stream.next() {
                Some(Ok(doc)) => {
                    if skipped < start {
                        skipped += 1;
                    } else {
                        documents.push(doc);
                    }
                }
                Some(Err(e)) => {
                    stream.close();
                    return Err(e);
                }
                None => break,
            }
        }
        stream.close();

        let more = documents.len() > limit;
        documents.truncate(limit);
        Ok(QueryPage {
            query,
            predicate,
            limit,
            documents,
            more,
        })
    }

    fn record(&self, text: &str, result: QueryResult<QueryPage>) -> QueryResult<QueryPage> {
        match &result {
            Ok(page) => {
                self.metrics.increment_queries_executed();
                self.metrics.add_documents_returned(page.documents.len() as u64);
                let returned = page.documents.len().to_string();
                let more = page.more.to_string();
                log_event_with_fields(
                    Event::QueryExecuted,
                    &[
                        ("query", text),
                        ("returned", returned.as_str()),
                        ("more", more.as_str()),
                    ],
                );
            }
            Err(e) => {
                self.metrics.increment_queries_rejected();
                let code = e.code().code();
                log_event_with_fields(
                    Event::QueryRejected,
                    &[("query", text), ("code", code), ("reason", e.message())],
                );
            }
        }
        result
    }
}
