//! Source Laziness Tests
//!
//! Tests for lazy evaluation invariants:
//! - Rewriting and read() never touch the index
//! - OR children are opened one at a time, on demand
//! - Closing a stream releases the index readers beneath it
//! - In-memory filters see only what the index returned
//! - One rewritten tree can be read from several threads at once

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use aeroquery::index::{ChangeIndex, IndexConfig, IndexRewriter, MemoryIndex, Schema};
use aeroquery::predicate::{ChangeDocument, OperatorPredicate, Predicate};
use aeroquery::query::{ChangeQueryBuilder, QueryError, QueryOptions, QueryResult};
use aeroquery::source::{IndexedQuery, ResultStream, Source};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

/// Backend that fails any search issued before `permit()`
#[derive(Debug)]
struct GatedIndex {
    inner: MemoryIndex,
    permitted: AtomicBool,
    searches: AtomicUsize,
    estimates: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl GatedIndex {
    fn new() -> Arc<Self> {
        let mut inner = MemoryIndex::new(Schema::latest());
        for id in 1..=6u64 {
            let file = if id % 2 == 0 { "a" } else { "b" };
            inner.insert(ChangeDocument::new(
                id,
                json!({"status": "new", "file": [file], "foo": "x", "updated": id as i64}),
            ));
        }
        Arc::new(Self {
            inner,
            permitted: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
            estimates: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn permit(&self) {
        self.permitted.store(true, Ordering::SeqCst);
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn estimates(&self) -> usize {
        self.estimates.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Iterator that records when it is dropped
struct Tracked {
    items: std::vec::IntoIter<ChangeDocument>,
    released: Arc<AtomicUsize>,
}

impl Iterator for Tracked {
    type Item = QueryResult<ChangeDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(Ok)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChangeIndex for GatedIndex {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn search(
        &self,
        predicate: &Predicate,
        opts: &QueryOptions,
    ) -> QueryResult<ResultStream<ChangeDocument>> {
        if !self.permitted.load(Ordering::SeqCst) {
            return Err(QueryError::index_failed(format!(
                "search before permit: {}",
                predicate
            )));
        }
        self.searches.fetch_add(1, Ordering::SeqCst);
        let items = self.inner.search(predicate, opts)?.to_list()?.into_iter();
        let released = Arc::clone(&self.released);
        Ok(ResultStream::lazy(move || Ok(Tracked { items, released })))
    }

    fn cardinality(&self, predicate: &Predicate) -> usize {
        self.estimates.fetch_add(1, Ordering::SeqCst);
        self.inner.cardinality(predicate)
    }
}

fn foo(value: &str) -> QueryResult<Predicate> {
    Ok(Predicate::operator(OperatorPredicate::exact("foo", value)))
}

fn plan(index: &Arc<GatedIndex>, query: &str) -> Source {
    let p = ChangeQueryBuilder::changes()
        .with_operator("foo", foo)
        .parse(query)
        .unwrap();
    let backend: Arc<dyn ChangeIndex> = Arc::clone(index) as Arc<dyn ChangeIndex>;
    IndexRewriter::new(backend, IndexConfig::default())
        .with_default_scope(ChangeQueryBuilder::status_open())
        .rewrite(&p, &QueryOptions::new(0, 10))
        .unwrap()
}

// =============================================================================
// No Premature Reads
// =============================================================================

/// Rewriting and read() of an index query perform no search.
#[test]
fn test_index_query_read_is_lazy() {
    let index = GatedIndex::new();
    let source = plan(&index, "file:a");

    let stream = source.read().unwrap();
    assert!(stream.is_pending());
    assert_eq!(index.searches(), 0);

    index.permit();
    let docs = stream.to_list().unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(index.searches(), 1);
}

/// AND read() defers choosing its driver and searching until the first pull.
#[test]
fn test_and_read_is_lazy() {
    let index = GatedIndex::new();
    let source = plan(&index, "file:a foo:x");
    assert!(matches!(source, Source::And(_)));

    let mut stream = source.read().unwrap();
    let raw = source.read_raw().unwrap();
    assert_eq!(index.searches(), 0);
    assert_eq!(index.estimates(), 0);
    drop(raw);

    index.permit();
    let first = stream.next().unwrap().unwrap();
    assert_eq!(first.id, 6);
    assert_eq!(index.searches(), 1);
    assert!(index.estimates() > 0);
}

/// OR opens children one at a time as results are pulled.
#[test]
fn test_or_opens_children_on_demand() {
    let index = GatedIndex::new();
    let source = plan(&index, "file:a OR foo:x");
    assert!(matches!(source, Source::Or(_)));

    let mut stream = source.read().unwrap();
    assert_eq!(index.searches(), 0);

    index.permit();
    stream.next().unwrap().unwrap();
    assert_eq!(index.searches(), 1);

    let rest: Vec<u64> = stream.map(|d| d.unwrap().id).collect();
    assert_eq!(index.searches(), 2);
    // file:a first, then open changes not already returned
    assert_eq!(rest, vec![4, 2, 5, 3, 1]);
}

/// A search error surfaces on the pull that needed it.
#[test]
fn test_error_surfaces_on_pull() {
    let index = GatedIndex::new();
    let source = plan(&index, "file:a");
    let mut stream = source.read().unwrap();

    let err = stream.next().unwrap().unwrap_err();
    assert!(err.message().contains("search before permit"));
}

// =============================================================================
// Close Propagation
// =============================================================================

/// Closing an AND stream releases the index reader beneath it.
#[test]
fn test_close_releases_reader() {
    let index = GatedIndex::new();
    index.permit();
    let source = plan(&index, "file:a foo:x");

    let mut stream = source.read().unwrap();
    stream.next().unwrap().unwrap();
    assert_eq!(index.released(), 0);

    stream.close();
    assert!(stream.is_closed());
    assert_eq!(index.released(), 1);
    assert!(stream.next().is_none());

    stream.close();
    assert_eq!(index.released(), 1);
}

/// Dropping a pending stream performs no search at all.
#[test]
fn test_drop_pending_stream() {
    let index = GatedIndex::new();
    let source = plan(&index, "file:a OR foo:x");
    let stream = source.read().unwrap();
    drop(stream);
    assert_eq!(index.searches(), 0);
    assert_eq!(index.released(), 0);
}

// =============================================================================
// Sharing Across Threads
// =============================================================================

fn assert_send_sync<T: Send + Sync>() {}

fn assert_send<T: Send>() {}

/// Rewritten trees and their parts can be shared; streams can be moved.
#[test]
fn test_source_types_are_thread_safe() {
    assert_send_sync::<Source>();
    assert_send_sync::<IndexedQuery>();
    assert_send_sync::<IndexRewriter>();
    assert_send_sync::<MemoryIndex>();
    assert_send::<ResultStream<ChangeDocument>>();
}

/// Concurrent reads of one tree see the same results.
#[test]
fn test_concurrent_reads_of_one_tree() {
    let index = GatedIndex::new();
    index.permit();
    let source = plan(&index, "file:a OR foo:x");
    let expected: Vec<u64> = source
        .read()
        .unwrap()
        .to_list()
        .unwrap()
        .iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(expected, vec![6, 4, 2, 5, 3, 1]);

    let results: Vec<Vec<u64>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let docs = source.read().unwrap().to_list().unwrap();
                    docs.iter().map(|d| d.id).collect::<Vec<u64>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ids in results {
        assert_eq!(ids, expected);
    }
    // one search per OR child, per read
    assert_eq!(index.searches(), 2 * 5);
    assert_eq!(index.released(), 2 * 5);
}
