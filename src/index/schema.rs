//! Index schema feed
//!
//! A schema names the fields the index can answer. Operators whose field is
//! missing from the running schema are evaluated in memory instead.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};
use crate::query::{QueryError, QueryResult};

const V1_FIELDS: &[&str] = &["status", "project", "branch", "ref", "owner", "topic"];
const V2_FIELDS: &[&str] = &["file", "hashtag", "message", "updated"];

/// Versioned set of index-answerable fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: u32,
    pub fields: BTreeSet<String>,
}

impl Schema {
    pub fn new<I, S>(version: u32, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// First schema generation: no file, hashtag, message or timestamp fields
    pub fn v1() -> Self {
        Self::new(1, V1_FIELDS.iter().copied())
    }

    pub fn v2() -> Self {
        Self::new(2, V1_FIELDS.iter().chain(V2_FIELDS.iter()).copied())
    }

    pub fn latest() -> Self {
        Self::v2()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Load a schema feed from a JSON file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config_invalid(format!("Failed to read schema: {}", e)))?;

        let schema: Schema = serde_json::from_str(&content)
            .map_err(|e| QueryError::config_invalid(format!("Invalid schema JSON: {}", e)))?;

        schema.validate()?;

        let version = schema.version.to_string();
        let fields = schema.fields.len().to_string();
        log_event_with_fields(
            Event::SchemaLoaded,
            &[("version", version.as_str()), ("fields", fields.as_str())],
        );
        Ok(schema)
    }

    fn validate(&self) -> QueryResult<()> {
        if self.version == 0 {
            return Err(QueryError::config_invalid("schema version must be > 0"));
        }
        if self.fields.is_empty() {
            return Err(QueryError::config_invalid("schema must declare at least one field"));
        }
        if self.fields.iter().any(|f| f.is_empty()) {
            return Err(QueryError::config_invalid("schema field names must be non-empty"));
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::latest()
    }
}
