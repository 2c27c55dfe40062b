//! Operator leaves and in-memory matching
//!
//! Matching follows the index semantics as closely as an in-memory check can:
//! string comparison is exact, array-valued fields match if any element does,
//! missing fields never match.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::ChangeDocument;

/// Something that can decide whether a document belongs to a result.
pub trait Matchable: Send + Sync + fmt::Debug {
    /// Returns true if the document satisfies this matcher
    fn matches(&self, doc: &ChangeDocument) -> bool;

    /// Relative evaluation cost; cheaper matchers run first
    fn cost(&self) -> u32;
}

/// Lifecycle status of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    New,
    Merged,
    Abandoned,
}

impl ChangeStatus {
    /// Stored form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::New => "new",
            ChangeStatus::Merged => "merged",
            ChangeStatus::Abandoned => "abandoned",
        }
    }

    /// Parses a stored status value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ChangeStatus::New),
            "merged" => Some(ChangeStatus::Merged),
            "abandoned" => Some(ChangeStatus::Abandoned),
            _ => None,
        }
    }
}

/// Parsed form of an operator value. Decides how the leaf matches in memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Exact string equality
    Exact,
    /// Case-insensitive substring
    Substring,
    /// Status within a set
    Status(Vec<ChangeStatus>),
    /// `updated` at or after epoch seconds
    After(i64),
    /// `updated` at or before epoch seconds
    Before(i64),
    /// Result-count cap; matches every document
    Limit(usize),
}

/// A `field:value` leaf.
///
/// `operator` is the name the user typed, `field` the index field it is
/// answered from. They differ for aliases such as `after:` (field `updated`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorPredicate {
    operator: String,
    field: String,
    value: String,
    operand: Operand,
}

impl OperatorPredicate {
    /// Creates a leaf
    pub fn new(
        operator: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        operand: Operand,
    ) -> Self {
        Self {
            operator: operator.into(),
            field: field.into(),
            value: value.into(),
            operand,
        }
    }

    /// Exact-match leaf whose operator name is its field name
    pub fn exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(field.clone(), field, value, Operand::Exact)
    }

    /// `limit:n` leaf
    pub fn limit(n: usize) -> Self {
        Self::new("limit", "limit", n.to_string(), Operand::Limit(n))
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Returns the cap if this is a limit leaf
    pub fn limit_value(&self) -> Option<usize> {
        match self.operand {
            Operand::Limit(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_limit(&self) -> bool {
        self.limit_value().is_some()
    }
}

impl Matchable for OperatorPredicate {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        if let Operand::Limit(_) = self.operand {
            return true;
        }
        let stored = match doc.field(&self.field) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };
        match &self.operand {
            Operand::Exact => any_text(stored, &|s: &str| s == self.value),
            Operand::Substring => {
                let needle = self.value.to_lowercase();
                any_text(stored, &|s: &str| s.to_lowercase().contains(&needle))
            }
            Operand::Status(allowed) => any_text(stored, &|s: &str| {
                ChangeStatus::parse(s).map_or(false, |status| allowed.contains(&status))
            }),
            Operand::After(ts) => stored.as_i64().map_or(false, |updated| updated >= *ts),
            Operand::Before(ts) => stored.as_i64().map_or(false, |updated| updated <= *ts),
            Operand::Limit(_) => true,
        }
    }

    fn cost(&self) -> u32 {
        match self.operand {
            Operand::Limit(_) => 0,
            Operand::Exact | Operand::Status(_) | Operand::After(_) | Operand::Before(_) => 1,
            Operand::Substring => 2,
        }
    }
}

/// Applies `test` to a scalar, or to each element of an array
fn any_text<F: Fn(&str) -> bool>(value: &Value, test: &F) -> bool {
    match value {
        Value::String(s) => test(s),
        Value::Number(n) => test(&n.to_string()),
        Value::Bool(b) => test(if *b { "true" } else { "false" }),
        Value::Array(items) => items.iter().any(|item| any_text(item, test)),
        _ => false,
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.starts_with('"')
        || value.starts_with('{')
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"')
}

impl fmt::Display for OperatorPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !needs_quoting(&self.value) {
            return write!(f, "{}:{}", self.operator, self.value);
        }
        write!(f, "{}:\"", self.operator)?;
        for c in self.value.chars() {
            if c == '"' || c == '\\' {
                write!(f, "\\")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "\"")
    }
}
