//! Metadata Predicate DSL
//!
//! Where-filters over document metadata: equality, membership, and
//! and/or composition. Filters are evaluated in-process against the
//! metadata JSON of each candidate row.

use serde_json::Value;

use crate::document::DocumentType;

// ============================================================================
// FILTER TREE
// ============================================================================

/// A predicate over a document's metadata record
#[derive(Debug, Clone, PartialEq)]
pub enum WhereFilter {
    /// Field equals value
    Eq(String, Value),
    /// Field is one of the values
    In(String, Vec<Value>),
    /// All sub-filters match
    And(Vec<WhereFilter>),
    /// At least one sub-filter matches
    Or(Vec<WhereFilter>),
}

impl WhereFilter {
    /// Field equality on a string value
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        WhereFilter::Eq(field.to_string(), value.into())
    }

    /// String-membership filter
    pub fn is_in<S: Into<String>>(field: &str, values: impl IntoIterator<Item = S>) -> Self {
        WhereFilter::In(
            field.to_string(),
            values.into_iter().map(|v| Value::String(v.into())).collect(),
        )
    }

    /// Type-membership filter over the closed taxonomy
    pub fn type_in(types: &[DocumentType]) -> Self {
        WhereFilter::is_in("type", types.iter().map(|t| t.as_str().to_string()))
    }

    /// Evaluate this filter against a metadata object
    pub fn matches(&self, meta: &Value) -> bool {
        match self {
            WhereFilter::Eq(field, value) => meta.get(field) == Some(value),
            WhereFilter::In(field, values) => meta
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            WhereFilter::And(subs) => subs.iter().all(|f| f.matches(meta)),
            WhereFilter::Or(subs) => subs.iter().any(|f| f.matches(meta)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_meta() -> Value {
        json!({
            "type": "note",
            "repository": "engram",
            "branch": "main",
            "status": "active",
        })
    }

    #[test]
    fn test_eq() {
        let meta = sample_meta();
        assert!(WhereFilter::eq("type", "note").matches(&meta));
        assert!(!WhereFilter::eq("type", "insight").matches(&meta));
        assert!(!WhereFilter::eq("missing", "x").matches(&meta));
    }

    #[test]
    fn test_in() {
        let meta = sample_meta();
        assert!(WhereFilter::is_in("branch", ["main", "master"]).matches(&meta));
        assert!(!WhereFilter::is_in("branch", ["develop"]).matches(&meta));
    }

    #[test]
    fn test_and_or() {
        let meta = sample_meta();
        let filter = WhereFilter::And(vec![
            WhereFilter::eq("repository", "engram"),
            WhereFilter::Or(vec![
                WhereFilter::eq("type", "note"),
                WhereFilter::eq("type", "insight"),
            ]),
        ]);
        assert!(filter.matches(&meta));

        let miss = WhereFilter::And(vec![
            WhereFilter::eq("repository", "other"),
            WhereFilter::eq("type", "note"),
        ]);
        assert!(!miss.matches(&meta));
    }

    #[test]
    fn test_branch_aware_shape() {
        // (type in filtered AND branch in branches) OR (type in cross-branch)
        let filter = WhereFilter::Or(vec![
            WhereFilter::And(vec![
                WhereFilter::type_in(&[DocumentType::FileMetadata, DocumentType::Skeleton]),
                WhereFilter::is_in("branch", ["feature-x", "main"]),
            ]),
            WhereFilter::type_in(&[DocumentType::Note, DocumentType::Insight]),
        ]);

        let code_on_branch = json!({"type": "file_metadata", "branch": "feature-x"});
        let code_elsewhere = json!({"type": "file_metadata", "branch": "old-branch"});
        let note_elsewhere = json!({"type": "note", "branch": "old-branch"});

        assert!(filter.matches(&code_on_branch));
        assert!(!filter.matches(&code_elsewhere));
        assert!(filter.matches(&note_elsewhere));
    }
}
