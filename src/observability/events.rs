//! Observable events
//!
//! Events are explicit and typed. Each carries its own severity so call
//! sites cannot disagree about how loud an event is.

use std::fmt;

use super::logger::Severity;

/// Observable events in query processing and staleness checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Index configuration loaded
    ConfigLoaded,
    /// Schema feed loaded
    SchemaLoaded,

    // Query processing
    /// Query text received
    QueryReceived,
    /// Predicate tree rewritten into sources
    QueryRewritten,
    /// Operator not in the index schema, evaluated in memory
    SchemaFallback,
    /// Residual branch wrapped with the default scope
    DefaultScopeApplied,
    /// Query executed successfully
    QueryExecuted,
    /// Query rejected
    QueryRejected,

    // Staleness
    /// Indexed document no longer matches the live refs
    DocumentStale,
    /// Ref lookup failed; document treated as stale
    StalenessCheckFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemaLoaded => "SCHEMA_LOADED",
            Event::QueryReceived => "QUERY_RECEIVED",
            Event::QueryRewritten => "QUERY_REWRITTEN",
            Event::SchemaFallback => "SCHEMA_FALLBACK",
            Event::DefaultScopeApplied => "DEFAULT_SCOPE_APPLIED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::DocumentStale => "DOCUMENT_STALE",
            Event::StalenessCheckFailed => "STALENESS_CHECK_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryRewritten | Event::SchemaFallback | Event::DefaultScopeApplied => {
                Severity::Trace
            }
            Event::ConfigLoaded
            | Event::SchemaLoaded
            | Event::QueryReceived
            | Event::QueryExecuted
            | Event::DocumentStale => Severity::Info,
            Event::QueryRejected | Event::StalenessCheckFailed => Severity::Warn,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::SchemaLoaded,
            Event::QueryReceived,
            Event::QueryRewritten,
            Event::SchemaFallback,
            Event::DefaultScopeApplied,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::DocumentStale,
            Event::StalenessCheckFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::QueryRewritten.severity(), Severity::Trace);
        assert_eq!(Event::QueryExecuted.severity(), Severity::Info);
        assert_eq!(Event::StalenessCheckFailed.severity(), Severity::Warn);
    }
}
