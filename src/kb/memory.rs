//! In-memory vector store: brute-force cosine similarity.
//!
//! Used for tests and local runs without a Qdrant instance.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::KbError;
use crate::kb::store::{Filter, ScoredPoint, SearchRequest, VectorStore};

/// A stored document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// Collections of documents held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document (by id) in `collection`.
    pub async fn upsert(&self, collection: &str, document: Document) {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    /// Number of documents in `collection`, ignoring filters.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<ScoredPoint>, KbError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Err(KbError::Search {
                collection: collection.to_string(),
                reason: "collection not found".into(),
            });
        };

        let mut hits: Vec<ScoredPoint> = docs
            .iter()
            .filter(|d| request.filter.matches(&d.payload))
            .map(|d| ScoredPoint {
                id: d.id.clone(),
                score: f64::from(cosine_sim(&request.vector, &d.vector)),
                payload: if request.with_payload {
                    d.payload.clone()
                } else {
                    serde_json::Value::Null
                },
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(request.limit);

        debug!(collection, hits = hits.len(), "In-memory search complete");
        Ok(hits)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, KbError> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| filter.matches(&d.payload)).count());
        Ok(count as u64)
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, vector: Vec<f32>, brain: &str) -> Document {
        Document {
            id: id.into(),
            vector,
            payload: json!({ "brain_id": brain, "template_text": id }),
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_sim(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_sim(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_sim(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_sim(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_ranks_and_filters_by_tenant() {
        let store = InMemoryStore::new();
        store.upsert("t", doc("close", vec![1.0, 0.1], "brain_a_v1")).await;
        store.upsert("t", doc("far", vec![0.1, 1.0], "brain_a_v1")).await;
        store.upsert("t", doc("other", vec![1.0, 0.0], "brain_b_v1")).await;

        let hits = store
            .search(
                "t",
                SearchRequest {
                    vector: vec![1.0, 0.0],
                    limit: 5,
                    filter: Filter::new().with("brain_id", "brain_a_v1"),
                    with_payload: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "close");
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].payload_str("brain_id"), Some("brain_a_v1"));
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryStore::new();
        store.upsert("t", doc("a", vec![1.0], "brain_a_v1")).await;
        store.upsert("t", doc("a", vec![0.5], "brain_a_v1")).await;
        assert_eq!(store.len("t").await, 1);
    }

    #[tokio::test]
    async fn count_respects_filter() {
        let store = InMemoryStore::new();
        store.upsert("t", doc("a", vec![1.0], "brain_a_v1")).await;
        store.upsert("t", doc("b", vec![1.0], "brain_b_v1")).await;
        let filter = Filter::new().with("brain_id", "brain_a_v1");
        assert_eq!(store.count("t", &filter).await.unwrap(), 1);
        assert_eq!(store.count("missing", &filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_missing_collection_errors() {
        let store = InMemoryStore::new();
        let err = store
            .search(
                "nope",
                SearchRequest {
                    vector: vec![1.0],
                    limit: 1,
                    filter: Filter::new(),
                    with_payload: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::Search { .. }));
    }
}
