//! CLI-specific error types
//!
//! Query failures keep the query layer's code so scripts can match on it.

use std::fmt;
use std::io;

use crate::query::{QueryError, QueryErrorCode};
use crate::staleness::StalenessError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration, schema or document file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Malformed request line
    BadRequest,
    /// Query rejected or failed
    Query(QueryErrorCode),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::BadRequest => "AERO_CLI_BAD_REQUEST",
            Self::Query(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BadRequest, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        match e.code() {
            QueryErrorCode::ConfigInvalid => Self::config_error(e.message()),
            code => Self::new(CliErrorCode::Query(code), e.message()),
        }
    }
}

impl From<StalenessError> for CliError {
    fn from(e: StalenessError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_keep_their_code() {
        let err: CliError = QueryError::parse("empty query").into();
        assert_eq!(err.code_str(), "AERO_QUERY_PARSE");

        let err: CliError = QueryError::config_invalid("max_limit must be > 0").into();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
    }
}
