//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for query processing and staleness checks.
///
/// All counters use Relaxed ordering; readers see eventually consistent values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    documents_returned: AtomicU64,
    staleness_checks: AtomicU64,
    stale_documents: AtomicU64,
    staleness_check_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Query metrics

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_documents_returned(&self, count: u64) {
        self.documents_returned.fetch_add(count, Ordering::Relaxed);
    }

    // Staleness metrics

    pub fn increment_staleness_checks(&self) {
        self.staleness_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_documents(&self) {
        self.stale_documents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_staleness_check_failures(&self) {
        self.staleness_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            documents_returned: self.documents_returned.load(Ordering::Relaxed),
            staleness_checks: self.staleness_checks.load(Ordering::Relaxed),
            stale_documents: self.stale_documents.load(Ordering::Relaxed),
            staleness_check_failures: self.staleness_check_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub documents_returned: u64,
    pub staleness_checks: u64,
    pub stale_documents: u64,
    pub staleness_check_failures: u64,
}
