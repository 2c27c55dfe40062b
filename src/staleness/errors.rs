//! Staleness errors
//!
//! Malformed ref-state or pattern wire data. Both map to
//! `AERO_INVALID_ARGUMENT` when surfaced through the query layer.

use thiserror::Error;

use crate::query::QueryError;

/// Result type for staleness operations
pub type StalenessResult<T> = Result<T, StalenessError>;

/// Errors parsing stored staleness data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StalenessError {
    /// Ref state entry is not `<project>:<ref>:<sha1>`
    #[error("invalid ref state: {0}")]
    InvalidRefState(String),

    /// Pattern entry is not `<project>:<glob>` or the glob is malformed
    #[error("invalid ref state pattern: {0}")]
    InvalidPattern(String),
}

impl From<StalenessError> for QueryError {
    fn from(err: StalenessError) -> Self {
        QueryError::invalid_argument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryErrorCode;

    #[test]
    fn test_converts_to_invalid_argument() {
        let err: QueryError = StalenessError::InvalidRefState("p:r".into()).into();
        assert_eq!(err.code(), QueryErrorCode::InvalidArgument);
        assert_eq!(err.message(), "invalid ref state: p:r");
    }
}
