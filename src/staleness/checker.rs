//! Staleness checker
//!
//! Compares the ref states recorded on an indexed document with the live
//! refs. Lookup failures count as stale: a document is only trusted when
//! every recorded state could be confirmed.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::Arc;

use serde_json::Value;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::predicate::ChangeDocument;

use super::errors::StalenessResult;
use super::pattern::RefStatePattern;
use super::ref_state::{ObjectId, RefState};

/// Document field holding `<project>:<ref>:<sha1>` entries
pub const REF_STATE_FIELD: &str = "ref_state";
/// Document field holding `<project>:<glob>` entries
pub const REF_STATE_PATTERN_FIELD: &str = "ref_state_pattern";

/// Read access to the live ref store
pub trait RefReader: Send + Sync {
    /// Current id of `ref_name`, `None` if the ref does not exist
    fn exact_ref(&self, project: &str, ref_name: &str) -> io::Result<Option<ObjectId>>;

    /// All refs whose name starts with `prefix`
    fn refs_by_prefix(&self, project: &str, prefix: &str) -> io::Result<Vec<(String, ObjectId)>>;
}

/// Decides whether indexed documents still reflect the live refs
pub struct StalenessChecker<'a, R: RefReader> {
    reader: &'a R,
    metrics: Arc<MetricsRegistry>,
}

impl<'a, R: RefReader> StalenessChecker<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// True if any recorded state diverged from the live refs.
    ///
    /// A ref matching a pattern must also appear among the recorded states
    /// of its project with its current id. Reader failures count as stale.
    pub fn is_stale(
        &self,
        id: u64,
        states: &BTreeMap<String, Vec<RefState>>,
        patterns: &BTreeMap<String, Vec<RefStatePattern>>,
    ) -> bool {
        self.metrics.increment_staleness_checks();
        let stale = match self.compare(states, patterns) {
            Ok(stale) => stale,
            Err(e) => {
                self.metrics.increment_staleness_check_failures();
                let id = id.to_string();
                let reason = e.to_string();
                log_event_with_fields(
                    Event::StalenessCheckFailed,
                    &[("id", id.as_str()), ("reason", reason.as_str())],
                );
                true
            }
        };
        if stale {
            self.metrics.increment_stale_documents();
            let id = id.to_string();
            log_event_with_fields(Event::DocumentStale, &[("id", id.as_str())]);
        }
        stale
    }

    /// Checks the states stored on a document; malformed data counts as stale
    pub fn check_document(&self, doc: &ChangeDocument) -> bool {
        match stored_states(doc) {
            Ok((states, patterns)) => self.is_stale(doc.id, &states, &patterns),
            Err(e) => {
                self.metrics.increment_staleness_checks();
                self.metrics.increment_staleness_check_failures();
                self.metrics.increment_stale_documents();
                let id = doc.id.to_string();
                let reason = e.to_string();
                log_event_with_fields(
                    Event::StalenessCheckFailed,
                    &[("id", id.as_str()), ("reason", reason.as_str())],
                );
                true
            }
        }
    }

    fn compare(
        &self,
        states: &BTreeMap<String, Vec<RefState>>,
        patterns: &BTreeMap<String, Vec<RefStatePattern>>,
    ) -> io::Result<bool> {
        for (project, recorded) in states {
            for state in recorded {
                let live = self
                    .reader
                    .exact_ref(project, &state.ref_name)?
                    .unwrap_or(ObjectId::ZERO);
                if live != state.id {
                    return Ok(true);
                }
            }
        }

        for (project, globs) in patterns {
            let recorded: HashSet<&RefState> = states
                .get(project)
                .map(|s| s.iter().collect())
                .unwrap_or_default();
            for glob in globs {
                for (ref_name, live) in self.reader.refs_by_prefix(project, glob.prefix())? {
                    if !glob.matches(&ref_name) {
                        continue;
                    }
                    let current = RefState::new(ref_name, Some(live));
                    if !recorded.contains(&current) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }
}

type StoredStates = (
    BTreeMap<String, Vec<RefState>>,
    BTreeMap<String, Vec<RefStatePattern>>,
);

fn stored_states(doc: &ChangeDocument) -> StalenessResult<StoredStates> {
    let states = RefState::parse_states(string_entries(doc, REF_STATE_FIELD))?;
    let patterns = RefStatePattern::parse_patterns(string_entries(doc, REF_STATE_PATTERN_FIELD))?;
    Ok((states, patterns))
}

/// String entries of an array field; non-string entries become empty and fail parsing
fn string_entries<'d>(doc: &'d ChangeDocument, field: &str) -> Vec<&'d str> {
    match doc.field(field) {
        Some(Value::Array(items)) => items.iter().map(|v| v.as_str().unwrap_or("")).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Refs(HashMap<(String, String), ObjectId>);

    impl RefReader for Refs {
        fn exact_ref(&self, project: &str, ref_name: &str) -> io::Result<Option<ObjectId>> {
            Ok(self.0.get(&(project.to_string(), ref_name.to_string())).copied())
        }

        fn refs_by_prefix(
            &self,
            project: &str,
            prefix: &str,
        ) -> io::Result<Vec<(String, ObjectId)>> {
            Ok(self
                .0
                .iter()
                .filter(|((p, r), _)| p == project && r.starts_with(prefix))
                .map(|((_, r), id)| (r.clone(), *id))
                .collect())
        }
    }

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    #[test]
    fn test_unchanged_ref_is_fresh() {
        let mut refs = Refs::default();
        refs.0.insert(("p".into(), "refs/heads/master".into()), id(1));

        let states =
            BTreeMap::from([("p".to_string(), vec![RefState::new("refs/heads/master", Some(id(1)))])]);
        assert!(!StalenessChecker::new(&refs).is_stale(1, &states, &BTreeMap::new()));

        refs.0.insert(("p".into(), "refs/heads/master".into()), id(2));
        let checker = StalenessChecker::new(&refs);
        assert!(checker.is_stale(1, &states, &BTreeMap::new()));
        assert_eq!(checker.metrics().snapshot().stale_documents, 1);
    }

    #[test]
    fn test_absent_ref_matches_zero_state() {
        let refs = Refs::default();
        let states = BTreeMap::from([("p".to_string(), vec![RefState::new("refs/meta", None)])]);
        assert!(!StalenessChecker::new(&refs).is_stale(1, &states, &BTreeMap::new()));
    }

    #[test]
    fn test_malformed_document_is_stale() {
        let refs = Refs::default();
        let doc = ChangeDocument::new(9, serde_json::json!({"ref_state": ["p:refs/x"]}));
        let checker = StalenessChecker::new(&refs);
        assert!(checker.check_document(&doc));
        assert_eq!(checker.metrics().snapshot().staleness_check_failures, 1);
    }
}
