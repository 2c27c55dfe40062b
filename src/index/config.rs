//! Index configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default. Validation runs on load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};
use crate::query::{QueryError, QueryResult};

/// Limits applied to every query against one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum number of leaf terms in one query (default 1024)
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,

    /// Largest result count the backend supports in one call (default 10000)
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Limit used when neither the caller nor the query sets one (default 500)
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Deepest page a caller may request (default unbounded)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_terms() -> usize {
    1024
}
fn default_max_limit() -> usize {
    10_000
}
fn default_limit() -> usize {
    500
}
fn default_max_pages() -> usize {
    usize::MAX
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_terms: default_max_terms(),
            max_limit: default_max_limit(),
            default_limit: default_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config_invalid(format!("Failed to read config: {}", e)))?;

        let config: IndexConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::config_invalid(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        let path_str = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path_str.as_str())]);
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.max_terms == 0 {
            return Err(QueryError::config_invalid("max_terms must be > 0"));
        }
        if self.max_limit == 0 {
            return Err(QueryError::config_invalid("max_limit must be > 0"));
        }
        if self.default_limit == 0 {
            return Err(QueryError::config_invalid("default_limit must be > 0"));
        }
        if self.default_limit > self.max_limit {
            return Err(QueryError::config_invalid(format!(
                "default_limit ({}) must not exceed max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if self.max_pages == 0 {
            return Err(QueryError::config_invalid("max_pages must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.max_terms, 1024);
        assert_eq!(config.max_limit, 10_000);
        assert_eq!(config.default_limit, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let file = write_config(r#"{"max_limit": 50, "default_limit": 20}"#);
        let config = IndexConfig::load(file.path()).unwrap();
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_terms, 1024);
        assert_eq!(config.max_pages, usize::MAX);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let file = write_config(r#"{"max_limit": 10, "default_limit": 20}"#);
        assert!(IndexConfig::load(file.path()).is_err());

        let file = write_config(r#"{"max_terms": 0}"#);
        assert!(IndexConfig::load(file.path()).is_err());

        let file = write_config("not json");
        let err = IndexConfig::load(file.path()).unwrap_err();
        assert!(err.message().contains("Invalid config JSON"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = IndexConfig::load(Path::new("/nonexistent/aeroquery.json")).unwrap_err();
        assert!(err.message().contains("Failed to read config"));
    }
}
