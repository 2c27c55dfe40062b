//! Explain output for rewritten queries
//!
//! Produces a deterministic, serializable view of a source tree.

use serde::Serialize;

use crate::query::QueryError;

use super::Source;

/// One node of an explained source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    /// `index`, `and`, `or`, `filter` or `matcher`
    pub kind: &'static str,
    /// Query text of the node, when it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Estimated result count for data sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<usize>,
    /// Limit requested by the caller (index nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Limit sent to the backend (index nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_limit: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Explain>,
}

impl Explain {
    /// Explains a rewritten source tree
    pub fn from_source(source: &Source) -> Self {
        let children = source.children().iter().map(Explain::from_source).collect();
        let cardinality = source.cardinality();
        match source {
            Source::Indexed(q) => Self {
                kind: "index",
                predicate: Some(q.predicate().to_string()),
                cardinality,
                limit: Some(q.limit()),
                backend_limit: Some(q.backend_limit()),
                children,
            },
            Source::And(_) => Self::composite("and", cardinality, children),
            Source::Or(_) => Self::composite("or", cardinality, children),
            Source::Filter(p) => Self {
                kind: "filter",
                predicate: Some(p.to_string()),
                cardinality: None,
                limit: None,
                backend_limit: None,
                children,
            },
            Source::Matcher(m) => Self {
                kind: "matcher",
                predicate: Some(format!("{:?}", m)),
                cardinality: None,
                limit: None,
                backend_limit: None,
                children,
            },
        }
    }

    fn composite(kind: &'static str, cardinality: Option<usize>, children: Vec<Explain>) -> Self {
        Self {
            kind,
            predicate: None,
            cardinality,
            limit: None,
            backend_limit: None,
            children,
        }
    }

    /// JSON form of a rejected query
    pub fn rejection(err: &QueryError) -> serde_json::Value {
        serde_json::json!({
            "accepted": false,
            "code": err.code().code(),
            "reason": err.message(),
        })
    }
}
