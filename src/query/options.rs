//! Paging and projection options

use serde::Serialize;

/// Paging window and field projection for one query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryOptions {
    pub start: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requested_fields: Vec<String>,
}

impl QueryOptions {
    pub fn new(start: usize, limit: usize) -> Self {
        Self {
            start,
            limit,
            requested_fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.requested_fields = fields;
        self
    }

    /// Options for a backend that cannot skip on its own behalf.
    ///
    /// Starts at 0 and asks for `start + limit` results, capped at
    /// `max_limit`. The caller skips the first `start` results itself.
    pub fn convert_for_backend(&self, max_limit: usize) -> QueryOptions {
        QueryOptions {
            start: 0,
            limit: self.start.saturating_add(self.limit).min(max_limit),
            requested_fields: self.requested_fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_for_backend() {
        let opts = QueryOptions::new(20, 11).with_fields(vec!["id".into()]);
        let backend = opts.convert_for_backend(10_000);
        assert_eq!(backend.start, 0);
        assert_eq!(backend.limit, 31);
        assert_eq!(backend.requested_fields, vec!["id".to_string()]);
    }

    #[test]
    fn test_convert_for_backend_caps_at_max() {
        let opts = QueryOptions::new(9_995, 100);
        assert_eq!(opts.convert_for_backend(10_000).limit, 10_000);

        let opts = QueryOptions::new(usize::MAX, 2);
        assert_eq!(opts.convert_for_backend(50).limit, 50);
    }
}
