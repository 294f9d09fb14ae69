//! Qdrant REST backend for the knowledge base.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::QdrantConfig;
use crate::error::KbError;
use crate::kb::store::{Filter, ScoredPoint, SearchRequest, VectorStore};

/// Qdrant client over its HTTP API.
pub struct QdrantStore {
    config: QdrantConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct QdrantPoint {
    id: serde_json::Value,
    score: f64,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QdrantCount {
    count: u64,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn points_url(&self, collection: &str, op: &str) -> String {
        format!(
            "{}/collections/{collection}/points/{op}",
            self.config.url.trim_end_matches('/')
        )
    }

    async fn post(
        &self,
        url: String,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, String> {
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.header("api-key", key.expose_secret());
        }

        let resp = request.send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }
        Ok(resp)
    }
}

/// Qdrant `must` filter of `match.value` conditions.
fn filter_json(filter: &Filter) -> serde_json::Value {
    let must: Vec<serde_json::Value> = filter
        .must
        .iter()
        .map(|m| json!({ "key": m.key, "match": { "value": m.value } }))
        .collect();
    json!({ "must": must })
}

/// Point ids are UUID strings or unsigned integers.
fn point_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<ScoredPoint>, KbError> {
        let body = json!({
            "vector": request.vector,
            "limit": request.limit,
            "filter": filter_json(&request.filter),
            "with_payload": request.with_payload,
        });

        let resp = self
            .post(self.points_url(collection, "search"), &body)
            .await
            .map_err(|reason| KbError::Search {
                collection: collection.to_string(),
                reason,
            })?;

        let parsed: QdrantResponse<Vec<QdrantPoint>> = resp
            .json()
            .await
            .map_err(|e| KbError::InvalidResponse(e.to_string()))?;

        debug!(collection, hits = parsed.result.len(), "Qdrant search complete");

        Ok(parsed
            .result
            .into_iter()
            .map(|p| ScoredPoint {
                id: point_id(&p.id),
                score: p.score,
                payload: p.payload.unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, KbError> {
        let body = json!({ "filter": filter_json(filter), "exact": true });

        let resp = self
            .post(self.points_url(collection, "count"), &body)
            .await
            .map_err(|reason| KbError::Count {
                collection: collection.to_string(),
                reason,
            })?;

        let parsed: QdrantResponse<QdrantCount> = resp
            .json()
            .await
            .map_err(|e| KbError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result.count)
    }
}
