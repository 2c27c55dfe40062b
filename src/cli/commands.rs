//! CLI command implementations
//!
//! Every command builds its own in-memory index from files, runs, writes one
//! JSON line per result to stdout and exits. Nothing is persisted.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::index::{IndexConfig, IndexRewriter, MemoryIndex, Schema};
use crate::observability::{Logger, MetricsRegistry, Severity};
use crate::predicate::ChangeDocument;
use crate::query::{ChangeQueryBuilder, QueryProcessor};
use crate::source::Explain;
use crate::staleness::{ObjectId, RefReader, StalenessChecker};

use super::args::{Cli, Command, IndexArgs, PageArgs};
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{read_requests, write_error, write_response};

/// One request line for `start`
#[derive(Debug, Clone, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    start: i64,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    no_limit: bool,
    #[serde(default)]
    fields: Vec<String>,
}

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    Logger::set_min_severity(match cli.verbose {
        0 => Severity::Warn,
        1 => Severity::Info,
        _ => Severity::Trace,
    });
    run_command(cli.command)
}

/// Dispatch a parsed command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Parse { query } => parse(&query),
        Command::Explain { index, page, query } => explain(&index, &page, &query),
        Command::Query { index, page, query } => self::query(&index, &page, &query),
        Command::Start { index } => start(&index),
        Command::Stale { docs, refs } => stale(&docs, &refs),
    }
}

/// Print the predicate tree of a query
pub fn parse(query: &str) -> CliResult<()> {
    let predicate = ChangeQueryBuilder::changes().parse(query)?;
    let terms = predicate.leaves().len();
    write_response(json!({
        "predicate": predicate.to_string(),
        "terms": terms,
    }))
}

/// Print the rewritten source tree of a query
pub fn explain(index: &IndexArgs, page: &PageArgs, query: &str) -> CliResult<()> {
    let mut processor = load_processor(index)?;
    apply_page(&mut processor, page);

    let plan = processor
        .builder()
        .parse(query)
        .and_then(|p| processor.plan(&p));
    match plan {
        Ok(source) => write_response(json!({
            "accepted": true,
            "plan": Explain::from_source(&source),
        })),
        Err(e) => write_response(Explain::rejection(&e)),
    }
}

/// Run one query and print its page
pub fn query(index: &IndexArgs, page: &PageArgs, query: &str) -> CliResult<()> {
    let mut processor = load_processor(index)?;
    apply_page(&mut processor, page);

    let result = processor.query(query)?;
    write_response(serde_json::to_value(&result)?)
}

/// Serve query requests from stdin until EOF
pub fn start(index: &IndexArgs) -> CliResult<()> {
    let metrics = Arc::new(MetricsRegistry::new());
    let mut processor = load_processor(index)?.with_metrics(Arc::clone(&metrics));

    for request in read_requests() {
        let request: QueryRequest = match request.and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| CliError::bad_request(format!("Invalid request: {}", e)))
        }) {
            Ok(request) => request,
            Err(e) if e.code() == CliErrorCode::IoError => return Err(e),
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        processor
            .set_start(request.start)
            .set_user_provided_limit(request.limit)
            .set_no_limit(request.no_limit)
            .set_requested_fields(request.fields);

        match processor.query(&request.query) {
            Ok(page) => write_response(serde_json::to_value(&page)?)?,
            Err(e) => {
                let e = CliError::from(e);
                write_error(e.code_str(), e.message())?;
            }
        }
    }

    write_response(json!({ "metrics": metrics.snapshot() }))
}

/// Print the ids of stale documents
pub fn stale(docs: &Path, refs: &Path) -> CliResult<()> {
    let documents = load_documents(docs)?;
    let snapshot = SnapshotRefs::load(refs)?;
    let checker = StalenessChecker::new(&snapshot);

    let stale: Vec<u64> = documents
        .iter()
        .filter(|doc| checker.check_document(doc))
        .map(|doc| doc.id)
        .collect();

    write_response(json!({
        "checked": documents.len(),
        "stale": stale,
        "metrics": checker.metrics().snapshot(),
    }))
}

fn load_processor(args: &IndexArgs) -> CliResult<QueryProcessor> {
    let config = match &args.config {
        Some(path) => IndexConfig::load(path)?,
        None => IndexConfig::default(),
    };
    let schema = match &args.schema {
        Some(path) => Schema::load(path)?,
        None => Schema::latest(),
    };
    let index = match &args.docs {
        Some(path) => MemoryIndex::load(path, schema)?,
        None => MemoryIndex::new(schema),
    };

    let rewriter = IndexRewriter::new(Arc::new(index), config)
        .with_default_scope(ChangeQueryBuilder::status_open());
    Ok(QueryProcessor::new(ChangeQueryBuilder::changes(), rewriter))
}

fn apply_page(processor: &mut QueryProcessor, page: &PageArgs) {
    processor
        .set_start(page.start)
        .set_user_provided_limit(page.limit)
        .set_no_limit(page.no_limit)
        .set_requested_fields(page.fields.clone());
}

fn load_documents(path: &Path) -> CliResult<Vec<ChangeDocument>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::config_error(format!("Failed to read documents: {}", e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::config_error(format!("Invalid documents JSON: {}", e)))
}

/// Live refs read from a JSON snapshot: `{project: {ref: sha1}}`
#[derive(Debug, Default)]
struct SnapshotRefs {
    refs: HashMap<String, BTreeMap<String, ObjectId>>,
}

impl SnapshotRefs {
    fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read refs: {}", e)))?;
        let raw: HashMap<String, BTreeMap<String, String>> = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid refs JSON: {}", e)))?;

        let mut refs = HashMap::with_capacity(raw.len());
        for (project, entries) in raw {
            let mut parsed = BTreeMap::new();
            for (name, sha) in entries {
                let id = ObjectId::from_hex(&sha).ok_or_else(|| {
                    CliError::config_error(format!("Invalid sha1 for {}:{}: {}", project, name, sha))
                })?;
                parsed.insert(name, id);
            }
            refs.insert(project, parsed);
        }
        Ok(Self { refs })
    }
}

impl RefReader for SnapshotRefs {
    fn exact_ref(&self, project: &str, ref_name: &str) -> io::Result<Option<ObjectId>> {
        Ok(self
            .refs
            .get(project)
            .and_then(|refs| refs.get(ref_name))
            .copied())
    }

    fn refs_by_prefix(&self, project: &str, prefix: &str) -> io::Result<Vec<(String, ObjectId)>> {
        let refs = match self.refs.get(project) {
            Some(refs) => refs,
            None => return Ok(Vec::new()),
        };
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_snapshot_refs_prefix_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let sha = "1111111111111111111111111111111111111111";
        write!(
            file,
            r#"{{"p": {{"refs/heads/a": "{sha}", "refs/heads/b": "{sha}", "refs/tags/v1": "{sha}"}}}}"#,
            sha = sha
        )
        .unwrap();

        let refs = SnapshotRefs::load(file.path()).unwrap();
        let heads = refs.refs_by_prefix("p", "refs/heads/").unwrap();
        assert_eq!(heads.len(), 2);
        assert!(refs.exact_ref("p", "refs/tags/v1").unwrap().is_some());
        assert!(refs.exact_ref("q", "refs/tags/v1").unwrap().is_none());
    }

    #[test]
    fn test_load_processor_defaults() {
        let processor = load_processor(&IndexArgs::default()).unwrap();
        assert_eq!(processor.rewriter().config(), &IndexConfig::default());
        assert!(processor.rewriter().default_scope().is_some());
    }
}
