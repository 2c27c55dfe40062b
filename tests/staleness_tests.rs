//! Staleness Tests
//!
//! Tests for ref-state and pattern wire formats and the staleness decision:
//! - Ref states round-trip through their wire form
//! - Malformed entries are rejected
//! - Patterns anchor and span path segments
//! - Reader failures are treated as stale

use std::collections::{BTreeMap, HashMap};
use std::io;

use aeroquery::predicate::ChangeDocument;
use aeroquery::query::{QueryError, QueryErrorCode};
use aeroquery::staleness::{
    ObjectId, RefReader, RefState, RefStatePattern, StalenessChecker, StalenessError,
};
use serde_json::json;

const SHA1: &str = "1111111111111111111111111111111111111111";
const SHA2: &str = "2222222222222222222222222222222222222222";

// =============================================================================
// Helper Functions
// =============================================================================

fn oid(hex: &str) -> ObjectId {
    ObjectId::from_hex(hex).unwrap()
}

/// In-memory ref store keyed by (project, ref)
#[derive(Default)]
struct FakeRefs {
    refs: HashMap<(String, String), ObjectId>,
    broken: bool,
}

impl FakeRefs {
    fn with(mut self, project: &str, ref_name: &str, hex: &str) -> Self {
        self.refs
            .insert((project.to_string(), ref_name.to_string()), oid(hex));
        self
    }
}

impl RefReader for FakeRefs {
    fn exact_ref(&self, project: &str, ref_name: &str) -> io::Result<Option<ObjectId>> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::Other, "ref store unavailable"));
        }
        Ok(self
            .refs
            .get(&(project.to_string(), ref_name.to_string()))
            .copied())
    }

    fn refs_by_prefix(&self, project: &str, prefix: &str) -> io::Result<Vec<(String, ObjectId)>> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::Other, "ref store unavailable"));
        }
        let mut out: Vec<(String, ObjectId)> = self
            .refs
            .iter()
            .filter(|((p, r), _)| p == project && r.starts_with(prefix))
            .map(|((_, r), id)| (r.clone(), *id))
            .collect();
        out.sort();
        Ok(out)
    }
}

fn states(entries: &[String]) -> BTreeMap<String, Vec<RefState>> {
    RefState::parse_states(entries).unwrap()
}

fn patterns(entries: &[&str]) -> BTreeMap<String, Vec<RefStatePattern>> {
    RefStatePattern::parse_patterns(entries).unwrap()
}

// =============================================================================
// Ref State Wire Format
// =============================================================================

/// Well-formed entries round-trip byte for byte.
#[test]
fn test_ref_state_round_trip() {
    let wire = format!("project:refs/heads/master:{}", SHA1);
    let parsed = RefState::parse_states([wire.as_bytes()]).unwrap();

    assert_eq!(parsed.len(), 1);
    let state = &parsed["project"][0];
    assert_eq!(state.to_byte_array("project"), wire.as_bytes());
}

/// Malformed entries fail the whole batch.
#[test]
fn test_ref_state_malformed() {
    let bad = [
        String::new(),
        "project".to_string(),
        "project:refs/heads/master".to_string(),
        "project:refs/heads/master:".to_string(),
        format!("project::{}", SHA1),
        format!(":refs/heads/master:{}", SHA1),
        "project:refs/heads/master:xyz".to_string(),
        format!("project:refs/heads/master:{}:extra", SHA1),
    ];
    for entry in &bad {
        let err = RefState::parse_states([entry.as_bytes()]).unwrap_err();
        assert!(
            matches!(err, StalenessError::InvalidRefState(_)),
            "accepted {:?}",
            entry
        );
    }

    let mixed = [format!("p:refs/heads/a:{}", SHA1), "p:refs/heads/b".to_string()];
    assert!(RefState::parse_states(&mixed).is_err());
}

/// Parse errors surface as invalid arguments in the query layer.
#[test]
fn test_wire_errors_are_invalid_arguments() {
    let err: QueryError = RefState::parse_states(["junk"]).unwrap_err().into();
    assert_eq!(err.code(), QueryErrorCode::InvalidArgument);
}

// =============================================================================
// Patterns
// =============================================================================

/// A trailing wildcard matches below the prefix, across segments.
#[test]
fn test_pattern_trailing_wildcard() {
    let parsed = patterns(&["project:refs/heads/*"]);
    let p = &parsed["project"][0];

    assert_eq!(p.prefix(), "refs/heads/");
    assert!(p.matches("refs/heads/foo"));
    assert!(p.matches("refs/heads/foo/bar"));
    assert!(!p.matches("xrefs/heads/foo"));
    assert!(!p.matches("refs/tags/foo"));
}

/// Interior wildcards with literal segments between them.
#[test]
fn test_pattern_interior_wildcards() {
    let parsed = patterns(&["project:refs/heads/foo/*-baz/*/quux"]);
    let p = &parsed["project"][0];

    assert_eq!(p.prefix(), "refs/heads/foo/");
    assert!(p.matches("refs/heads/foo/x-baz/y/quux"));
    assert!(!p.matches("refs/heads/foo/x-baz/x/y"));
    assert!(!p.matches("refs/heads/foo/x-baz/y/QUUX"));
}

/// Pattern wire form round-trips.
#[test]
fn test_pattern_round_trip() {
    let parsed = patterns(&["project:refs/users/*/edit"]);
    assert_eq!(
        parsed["project"][0].to_byte_array("project"),
        b"project:refs/users/*/edit".to_vec()
    );
}

/// Project-less, wildcard-less and malformed patterns are rejected.
#[test]
fn test_pattern_malformed() {
    for entry in [
        "refs/heads/*",
        ":refs/heads/*",
        "project:refs/heads/master",
        "project:*",
        "project:refs/heads//*",
        "project:refs/heads/*.lock",
    ] {
        assert!(
            RefStatePattern::parse_patterns([entry]).is_err(),
            "accepted {:?}",
            entry
        );
    }
}

// =============================================================================
// Staleness Decision
// =============================================================================

/// Unchanged refs are fresh; a moved ref is stale.
#[test]
fn test_moved_ref_is_stale() {
    let recorded = states(&[format!("p:refs/heads/master:{}", SHA1)]);

    let live = FakeRefs::default().with("p", "refs/heads/master", SHA1);
    assert!(!StalenessChecker::new(&live).is_stale(1, &recorded, &BTreeMap::new()));

    let live = FakeRefs::default().with("p", "refs/heads/master", SHA2);
    assert!(StalenessChecker::new(&live).is_stale(1, &recorded, &BTreeMap::new()));
}

/// A deleted ref is stale unless it was recorded as absent.
#[test]
fn test_deleted_ref() {
    let live = FakeRefs::default();
    let recorded = states(&[format!("p:refs/heads/master:{}", SHA1)]);
    assert!(StalenessChecker::new(&live).is_stale(1, &recorded, &BTreeMap::new()));

    let absent = states(&[format!("p:refs/heads/master:{}", "0".repeat(40))]);
    assert!(!StalenessChecker::new(&live).is_stale(1, &absent, &BTreeMap::new()));
}

/// A new ref under a pattern makes the document stale.
#[test]
fn test_new_ref_under_pattern_is_stale() {
    let recorded = states(&[format!("p:refs/draft-comments/1:{}", SHA1)]);
    let globs = patterns(&["p:refs/draft-comments/*"]);

    let live = FakeRefs::default().with("p", "refs/draft-comments/1", SHA1);
    assert!(!StalenessChecker::new(&live).is_stale(1, &recorded, &globs));

    let live = live.with("p", "refs/draft-comments/2", SHA2);
    assert!(StalenessChecker::new(&live).is_stale(1, &recorded, &globs));
}

/// Refs under the prefix that the pattern does not match are ignored.
#[test]
fn test_prefix_refs_outside_pattern_ignored() {
    let globs = patterns(&["p:refs/users/*/edit"]);
    let live = FakeRefs::default().with("p", "refs/users/1/draft", SHA1);
    assert!(!StalenessChecker::new(&live).is_stale(1, &BTreeMap::new(), &globs));
}

/// Reader failures count as stale and are recorded.
#[test]
fn test_reader_failure_is_stale() {
    let live = FakeRefs {
        broken: true,
        ..FakeRefs::default()
    };
    let recorded = states(&[format!("p:refs/heads/master:{}", SHA1)]);

    let checker = StalenessChecker::new(&live);
    assert!(checker.is_stale(42, &recorded, &BTreeMap::new()));

    let snapshot = checker.metrics().snapshot();
    assert_eq!(snapshot.staleness_checks, 1);
    assert_eq!(snapshot.staleness_check_failures, 1);
    assert_eq!(snapshot.stale_documents, 1);
}

/// Stored document fields drive the check.
#[test]
fn test_check_document_fields() {
    let live = FakeRefs::default()
        .with("p", "refs/heads/master", SHA1)
        .with("p", "refs/changes/01/1/meta", SHA2);
    let checker = StalenessChecker::new(&live);

    let fresh = ChangeDocument::new(
        1,
        json!({
            "ref_state": [
                format!("p:refs/heads/master:{}", SHA1),
                format!("p:refs/changes/01/1/meta:{}", SHA2),
            ],
            "ref_state_pattern": ["p:refs/changes/01/1/*"],
        }),
    );
    assert!(!checker.check_document(&fresh));

    let moved = ChangeDocument::new(
        2,
        json!({"ref_state": [format!("p:refs/heads/master:{}", SHA2)]}),
    );
    assert!(checker.check_document(&moved));

    let corrupt = ChangeDocument::new(3, json!({"ref_state": [17]}));
    assert!(checker.check_document(&corrupt));
}
