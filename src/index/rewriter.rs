//! Index rewriter
//!
//! Turns a predicate tree into a source tree in which the largest possible
//! sub-trees are answered by the index.
//!
//! # Rules
//!
//! 1. A leaf whose field is in the schema is indexed; AND/OR nodes whose
//!    children are all indexed are indexed
//! 2. NOT nodes and leaves outside the schema are residual (in memory)
//! 3. In a mixed AND, the indexed children merge into one index query placed
//!    first; the rest filter its results
//! 4. In a mixed OR, the indexed children merge into one index query at the
//!    position of the first of them; residual branches are scoped with the
//!    default scope so every OR child can be read
//! 5. A residual root is scoped the same way
//! 6. `limit:N` leaves are overridden with the backend limit; in an AND
//!    they are dropped, since the options already carry the limit
//! 7. More than `max_terms` leaves abort the rewrite before any I/O

use std::collections::HashMap;
use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event, Logger};
use crate::predicate::{OperatorPredicate, Predicate, PredicateKind};
use crate::query::{QueryError, QueryOptions, QueryResult};
use crate::source::{IndexedQuery, Source};

use super::backend::ChangeIndex;
use super::config::IndexConfig;

/// Rewrites predicate trees against one index
#[derive(Debug, Clone)]
pub struct IndexRewriter {
    index: Arc<dyn ChangeIndex>,
    config: IndexConfig,
    default_scope: Option<Predicate>,
}

/// Rewrite outcome for one node
enum Part {
    /// Entire sub-tree is index-answerable, unchanged
    Indexed(Predicate),
    /// Sub-tree must be evaluated in memory
    Residual(Predicate),
    /// Sub-tree already rewritten into a data source
    Source(Source),
}

impl IndexRewriter {
    pub fn new(index: Arc<dyn ChangeIndex>, config: IndexConfig) -> Self {
        Self {
            index,
            config,
            default_scope: None,
        }
    }

    /// Predicate ANDed onto branches the index cannot answer
    pub fn with_default_scope(mut self, scope: Predicate) -> Self {
        self.default_scope = Some(scope);
        self
    }

    pub fn index(&self) -> &Arc<dyn ChangeIndex> {
        &self.index
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn default_scope(&self) -> Option<&Predicate> {
        self.default_scope.as_ref()
    }

    /// True if the running schema can answer this leaf
    pub fn is_index_predicate(&self, op: &OperatorPredicate) -> bool {
        !op.is_limit() && self.index.schema().has_field(op.field())
    }

    /// Rewrites `input` into a source tree whose root is a data source
    pub fn rewrite(&self, input: &Predicate, opts: &QueryOptions) -> QueryResult<Source> {
        let mut pass = RewritePass {
            rewriter: self,
            opts,
            backend_limit: opts.convert_for_backend(self.config.max_limit).limit,
            terms: 0,
            queries: HashMap::new(),
        };

        let source = match pass.rewrite_node(input)? {
            Part::Indexed(p) => Source::Indexed(pass.query(p)),
            Part::Source(s) => s,
            Part::Residual(p) => pass.scoped(p)?,
        };

        if Logger::enabled(Event::QueryRewritten.severity()) {
            let query = input.to_string();
            let plan = source.to_string();
            log_event_with_fields(
                Event::QueryRewritten,
                &[("query", query.as_str()), ("plan", plan.as_str())],
            );
        }
        Ok(source)
    }
}

/// State of one rewrite call
struct RewritePass<'a> {
    rewriter: &'a IndexRewriter,
    opts: &'a QueryOptions,
    backend_limit: usize,
    terms: usize,
    /// Structurally equal sub-trees share one index query
    queries: HashMap<Predicate, Arc<IndexedQuery>>,
}

impl<'a> RewritePass<'a> {
    fn rewrite_node(&mut self, p: &Predicate) -> QueryResult<Part> {
        match p.kind() {
            PredicateKind::Operator(op) => {
                if op.is_limit() {
                    return Ok(Part::Residual(self.limit_leaf()));
                }
                self.count_term()?;
                if self.rewriter.is_index_predicate(op) {
                    return Ok(Part::Indexed(p.clone()));
                }
                if Logger::enabled(Event::SchemaFallback.severity()) {
                    let leaf = p.to_string();
                    let version = self.rewriter.index.schema().version.to_string();
                    log_event_with_fields(
                        Event::SchemaFallback,
                        &[("operator", leaf.as_str()), ("schema_version", version.as_str())],
                    );
                }
                Ok(Part::Residual(p.clone()))
            }
            PredicateKind::Not(_) => Ok(Part::Residual(self.residual(p)?)),
            PredicateKind::And(children) => {
                let mut parts = children
                    .iter()
                    .map(|c| self.rewrite_node(c))
                    .collect::<QueryResult<Vec<Part>>>()?;
                if parts.iter().any(|part| !is_limit_part(part)) {
                    parts.retain(|part| !is_limit_part(part));
                }
                self.combine(p, parts, true)
            }
            PredicateKind::Or(children) => {
                let parts = children
                    .iter()
                    .map(|c| self.rewrite_node(c))
                    .collect::<QueryResult<Vec<Part>>>()?;
                self.combine(p, parts, false)
            }
        }
    }

    fn combine(&mut self, p: &Predicate, parts: Vec<Part>, conjunction: bool) -> QueryResult<Part> {
        if parts.iter().all(|part| matches!(part, Part::Indexed(_))) {
            let indexed: Vec<Predicate> = parts.into_iter().filter_map(into_indexed).collect();
            let unchanged = indexed.len() == p.child_count()
                && indexed
                    .iter()
                    .zip(p.children())
                    .all(|(a, b)| Predicate::ptr_eq(a, b));
            if unchanged {
                return Ok(Part::Indexed(p.clone()));
            }
            return Ok(Part::Indexed(if conjunction {
                Predicate::and(indexed)
            } else {
                Predicate::or(indexed)
            }));
        }

        if parts.iter().all(|part| matches!(part, Part::Residual(_))) {
            let mut residual: Vec<Predicate> = parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Residual(r) => Some(r),
                    _ => None,
                })
                .collect();
            if residual.len() == 1 {
                return Ok(Part::Residual(residual.remove(0)));
            }
            return Ok(Part::Residual(p.copy(residual)?));
        }

        if conjunction {
            self.partition_and(parts)
        } else {
            self.partition_or(parts)
        }
    }

    fn partition_and(&mut self, parts: Vec<Part>) -> QueryResult<Part> {
        let mut indexed = Vec::new();
        let mut rest = Vec::new();
        for part in parts {
            match part {
                Part::Indexed(p) => indexed.push(p),
                Part::Residual(p) => rest.push(Source::Filter(p)),
                Part::Source(s) => rest.push(s),
            }
        }

        let mut children = Vec::with_capacity(rest.len() + 1);
        if !indexed.is_empty() {
            children.push(Source::Indexed(self.query(Predicate::and(indexed))));
        }
        children.extend(rest);
        Ok(Part::Source(Source::and(children)))
    }

    fn partition_or(&mut self, parts: Vec<Part>) -> QueryResult<Part> {
        let indexed: Vec<Predicate> = parts
            .iter()
            .filter_map(|part| match part {
                Part::Indexed(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        let mut merged = if indexed.is_empty() {
            None
        } else {
            Some(Source::Indexed(self.query(Predicate::or(indexed))))
        };

        let mut children = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Part::Indexed(_) => {
                    if let Some(m) = merged.take() {
                        children.push(m);
                    }
                }
                Part::Residual(p) => children.push(self.scoped(p)?),
                Part::Source(s) => children.push(s),
            }
        }
        Ok(Part::Source(Source::or(children)?))
    }

    /// `scope AND residual`, readable through the scope's index query
    fn scoped(&mut self, residual: Predicate) -> QueryResult<Source> {
        let scope = match &self.rewriter.default_scope {
            Some(scope) => scope.clone(),
            None => {
                return Err(QueryError::parse_at(
                    "query cannot be answered by the index",
                    residual.to_string(),
                ))
            }
        };
        if !self.answerable(&scope) {
            return Err(QueryError::config_invalid(format!(
                "default scope is not answerable by the index: {}",
                scope
            )));
        }

        if Logger::enabled(Event::DefaultScopeApplied.severity()) {
            let scope_text = scope.to_string();
            let branch = residual.to_string();
            log_event_with_fields(
                Event::DefaultScopeApplied,
                &[("scope", scope_text.as_str()), ("branch", branch.as_str())],
            );
        }
        let scope_query = Source::Indexed(self.query(scope));
        Ok(Source::and(vec![scope_query, Source::Filter(residual)]))
    }

    fn answerable(&self, p: &Predicate) -> bool {
        match p.kind() {
            PredicateKind::Operator(op) => self.rewriter.is_index_predicate(op),
            PredicateKind::And(children) | PredicateKind::Or(children) => {
                children.iter().all(|c| self.answerable(c))
            }
            PredicateKind::Not(_) => false,
        }
    }

    /// Rebuilds a residual sub-tree, counting its terms and overriding limits
    fn residual(&mut self, p: &Predicate) -> QueryResult<Predicate> {
        match p.kind() {
            PredicateKind::Operator(op) if op.is_limit() => Ok(self.limit_leaf()),
            PredicateKind::Operator(_) => {
                self.count_term()?;
                Ok(p.clone())
            }
            _ => {
                let children = p
                    .children()
                    .iter()
                    .map(|c| self.residual(c))
                    .collect::<QueryResult<Vec<Predicate>>>()?;
                p.copy(children)
            }
        }
    }

    fn limit_leaf(&self) -> Predicate {
        Predicate::operator(OperatorPredicate::limit(self.backend_limit))
    }

    fn count_term(&mut self) -> QueryResult<()> {
        self.terms += 1;
        if self.terms > self.rewriter.config.max_terms {
            return Err(QueryError::too_many_terms(self.rewriter.config.max_terms));
        }
        Ok(())
    }

    fn query(&mut self, p: Predicate) -> Arc<IndexedQuery> {
        let index = Arc::clone(&self.rewriter.index);
        let opts = self.opts;
        let max_limit = self.rewriter.config.max_limit;
        let query = self
            .queries
            .entry(p.clone())
            .or_insert_with(|| Arc::new(IndexedQuery::new(index, p, opts, max_limit)));
        Arc::clone(query)
    }
}

fn is_limit_part(part: &Part) -> bool {
    match part {
        Part::Residual(p) => p.as_operator().map_or(false, OperatorPredicate::is_limit),
        _ => false,
    }
}

fn into_indexed(part: Part) -> Option<Predicate> {
    match part {
        Part::Indexed(p) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MemoryIndex, Schema};
    use crate::query::ChangeQueryBuilder;

    fn rewriter(max_terms: usize) -> IndexRewriter {
        let config = IndexConfig {
            max_terms,
            ..IndexConfig::default()
        };
        IndexRewriter::new(Arc::new(MemoryIndex::new(Schema::latest())), config)
            .with_default_scope(ChangeQueryBuilder::status_open())
    }

    fn parse(q: &str) -> Predicate {
        ChangeQueryBuilder::changes()
            .with_operator("foo", |v| {
                Ok(Predicate::operator(OperatorPredicate::exact("foo", v)))
            })
            .parse(q)
            .unwrap()
    }

    #[test]
    fn test_all_indexed_is_single_query() {
        let r = rewriter(100);
        let p = parse("file:a (file:b OR topic:c)");
        let source = r.rewrite(&p, &QueryOptions::new(0, 10)).unwrap();
        match source {
            Source::Indexed(q) => assert_eq!(q.predicate(), &p),
            other => panic!("expected index query, got {}", other),
        }
    }

    #[test]
    fn test_limit_dropped_from_and() {
        let r = rewriter(100);
        let source = r
            .rewrite(&parse("status:open limit:5"), &QueryOptions::new(0, 10))
            .unwrap();
        match source {
            Source::Indexed(q) => assert_eq!(q.predicate(), &parse("status:open")),
            other => panic!("expected index query, got {}", other),
        }
    }

    #[test]
    fn test_limit_overridden_in_residual() {
        let r = rewriter(100);
        let source = r
            .rewrite(&parse("-(foo:a limit:3)"), &QueryOptions::new(5, 10))
            .unwrap();
        let filter = &source.children()[1];
        assert_eq!(filter.to_string(), "-(foo:a limit:15)");
    }

    #[test]
    fn test_term_counting_includes_negated_leaves() {
        let r = rewriter(2);
        assert!(r.rewrite(&parse("-foo:a file:b"), &QueryOptions::new(0, 1)).is_ok());
        let err = r
            .rewrite(&parse("-foo:a -foo:b file:c"), &QueryOptions::new(0, 1))
            .unwrap_err();
        assert!(err.message().contains("too many terms"));
    }

    #[test]
    fn test_no_default_scope_rejects_residual_root() {
        let r = IndexRewriter::new(
            Arc::new(MemoryIndex::new(Schema::latest())),
            IndexConfig::default(),
        );
        let err = r.rewrite(&parse("foo:a"), &QueryOptions::new(0, 1)).unwrap_err();
        assert_eq!(err.fragment(), Some("foo:a"));
    }

    #[test]
    fn test_unanswerable_scope_is_config_error() {
        let r = IndexRewriter::new(
            Arc::new(MemoryIndex::new(Schema::latest())),
            IndexConfig::default(),
        )
        .with_default_scope(parse("foo:x"));
        let err = r.rewrite(&parse("foo:a"), &QueryOptions::new(0, 1)).unwrap_err();
        assert_eq!(err.code(), crate::query::QueryErrorCode::ConfigInvalid);
    }
}
