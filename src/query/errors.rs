//! Query error types
//!
//! Error codes:
//! - AERO_QUERY_PARSE (REJECT)
//! - AERO_INVALID_ARGUMENT (REJECT)
//! - AERO_SOURCE_CONTRACT (FATAL)
//! - AERO_INDEX_FAILED (ERROR)
//! - AERO_CONFIG_INVALID (ERROR)

use std::fmt;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Client request rejected, nothing executed
    Reject,
    /// Operation failed, may be retried
    Error,
    /// Internal contract broken; indicates a bug in the caller
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Query error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorCode {
    /// Malformed query text, unknown operator, or a query the engine refuses
    QueryParse,
    /// Malformed argument to a tree or wire-format operation
    InvalidArgument,
    /// Composite source built from children that cannot serve it
    SourceContract,
    /// Index backend failure
    IndexFailed,
    /// Invalid configuration or schema feed
    ConfigInvalid,
}

impl QueryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::QueryParse => "AERO_QUERY_PARSE",
            QueryErrorCode::InvalidArgument => "AERO_INVALID_ARGUMENT",
            QueryErrorCode::SourceContract => "AERO_SOURCE_CONTRACT",
            QueryErrorCode::IndexFailed => "AERO_INDEX_FAILED",
            QueryErrorCode::ConfigInvalid => "AERO_CONFIG_INVALID",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryErrorCode::QueryParse | QueryErrorCode::InvalidArgument => Severity::Reject,
            QueryErrorCode::IndexFailed | QueryErrorCode::ConfigInvalid => Severity::Error,
            QueryErrorCode::SourceContract => Severity::Fatal,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    code: QueryErrorCode,
    message: String,
    /// Offending query fragment, if any
    fragment: Option<String>,
}

impl QueryError {
    /// Create a parse error without a fragment
    pub fn parse(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::QueryParse,
            message: reason.into(),
            fragment: None,
        }
    }

    /// Create a parse error that names the offending fragment
    pub fn parse_at(reason: impl Into<String>, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        Self {
            code: QueryErrorCode::QueryParse,
            message: format!("{}: {}", reason.into(), fragment),
            fragment: Some(fragment),
        }
    }

    /// Create an unknown operator error
    pub fn unsupported_operator(field: &str, value: &str) -> Self {
        Self::parse_at("Unsupported operator", format!("{}:{}", field, value))
    }

    /// Create the term-guard error
    pub fn too_many_terms(max_terms: usize) -> Self {
        Self::parse(format!("too many terms in query (max {})", max_terms))
    }

    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::InvalidArgument,
            message: reason.into(),
            fragment: None,
        }
    }

    /// Create a source contract violation
    pub fn source_contract(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::SourceContract,
            message: reason.into(),
            fragment: None,
        }
    }

    /// Create an index backend failure
    pub fn index_failed(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::IndexFailed,
            message: reason.into(),
            fragment: None,
        }
    }

    /// Create a configuration error
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::ConfigInvalid,
            message: reason.into(),
            fragment: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns true for contract violations that indicate a bug
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending query fragment if known
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for QueryError {}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(QueryErrorCode::QueryParse.code(), "AERO_QUERY_PARSE");
        assert_eq!(QueryErrorCode::InvalidArgument.code(), "AERO_INVALID_ARGUMENT");
        assert_eq!(QueryErrorCode::SourceContract.code(), "AERO_SOURCE_CONTRACT");
        assert_eq!(QueryErrorCode::IndexFailed.code(), "AERO_INDEX_FAILED");
        assert_eq!(QueryErrorCode::ConfigInvalid.code(), "AERO_CONFIG_INVALID");
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(QueryErrorCode::QueryParse.severity(), Severity::Reject);
        assert_eq!(QueryErrorCode::IndexFailed.severity(), Severity::Error);
        assert_eq!(QueryErrorCode::SourceContract.severity(), Severity::Fatal);
        assert!(QueryError::source_contract("x").is_fatal());
        assert!(!QueryError::parse("x").is_fatal());
    }

    #[test]
    fn test_unsupported_operator_names_token() {
        let err = QueryError::unsupported_operator("nosuch", "value");
        assert_eq!(err.fragment(), Some("nosuch:value"));
        assert!(err.message().contains("nosuch:value"));
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::too_many_terms(10);
        let display = format!("{}", err);
        assert!(display.contains("REJECT"));
        assert!(display.contains("AERO_QUERY_PARSE"));
        assert!(display.contains("too many terms"));
    }
}
