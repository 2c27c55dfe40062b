//! Change documents as stored in and returned from the index

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A change record as seen by the query engine.
///
/// Field names are the index field names (`status`, `project`, `file`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDocument {
    /// Numeric change id, unique within an index
    pub id: u64,
    /// Stored fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ChangeDocument {
    /// Creates a document from a JSON body. Non-object bodies carry no fields.
    pub fn new(id: u64, body: Value) -> Self {
        let fields = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { id, fields }
    }

    /// Returns a stored field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Last-updated timestamp in epoch seconds, 0 when absent
    pub fn updated(&self) -> i64 {
        self.field("updated").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Returns a copy holding only the requested fields.
    ///
    /// An empty request keeps every field.
    pub fn project(&self, requested: &[String]) -> ChangeDocument {
        if requested.is_empty() {
            return self.clone();
        }
        let fields = requested
            .iter()
            .filter_map(|name| self.fields.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        ChangeDocument { id: self.id, fields }
    }
}
