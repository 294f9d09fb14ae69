//! Vector store and embedding boundaries.
//!
//! The matcher only ever reads through these traits. Implementations:
//! [`QdrantStore`](crate::kb::qdrant::QdrantStore),
//! [`InMemoryStore`](crate::kb::memory::InMemoryStore) and
//! [`VoyageEmbedder`](crate::kb::voyage::VoyageEmbedder).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, KbError};

/// One exact-match constraint on a payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub value: String,
}

/// Conjunction of exact-match field constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub must: Vec<FieldMatch>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `key == value` constraint.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.must.push(FieldMatch {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Whether a JSON payload satisfies every constraint.
    pub fn matches(&self, payload: &serde_json::Value) -> bool {
        self.must.iter().all(|m| match payload.get(&m.key) {
            Some(serde_json::Value::String(s)) => s == &m.value,
            Some(other) => other.to_string() == m.value,
            None => false,
        })
    }
}

/// A similarity search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Filter,
    pub with_payload: bool,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f64,
    pub payload: serde_json::Value,
}

impl ScoredPoint {
    /// String payload field, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// String-array payload field; missing or malformed yields empty.
    pub fn payload_strings(&self, key: &str) -> Vec<String> {
        self.payload
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Read-only vector similarity backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ranked hits, best first.
    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<ScoredPoint>, KbError>;

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, KbError>;
}

/// Text embedding function.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality, fixed for the lifetime of the embedder.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_all_constraints() {
        let filter = Filter::new()
            .with("brain_id", "brain_saas_v1")
            .with("reply_type", "pricing_question");
        assert!(filter.matches(&json!({
            "brain_id": "brain_saas_v1",
            "reply_type": "pricing_question",
            "tier": 2
        })));
        assert!(!filter.matches(&json!({
            "brain_id": "brain_saas_v1",
            "reply_type": "referral"
        })));
        assert!(!filter.matches(&json!({ "brain_id": "brain_saas_v1" })));
    }

    #[test]
    fn filter_compares_non_string_values_textually() {
        let filter = Filter::new().with("tier", "1");
        assert!(filter.matches(&json!({ "tier": 1 })));
        assert!(!filter.matches(&json!({ "tier": 2 })));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({})));
    }

    #[test]
    fn payload_accessors() {
        let point = ScoredPoint {
            id: "p1".into(),
            score: 0.8,
            payload: json!({ "template_text": "Hi {{first_name}}", "variables": ["first_name", 3] }),
        };
        assert_eq!(point.payload_str("template_text"), Some("Hi {{first_name}}"));
        assert_eq!(point.payload_str("missing"), None);
        assert_eq!(point.payload_strings("variables"), vec!["first_name".to_string()]);
        assert!(point.payload_strings("follow_up_actions").is_empty());
    }
}
