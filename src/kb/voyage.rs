//! Voyage AI embeddings over HTTP.
//!
//! Rate limits (HTTP 429) are retried with random exponential backoff;
//! every other failure is returned immediately.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::VoyageConfig;
use crate::error::EmbeddingError;
use crate::kb::store::Embedder;

const PROVIDER: &str = "voyage";

/// Backoff ceiling between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Voyage embedding client using `input_type = "query"`.
pub struct VoyageEmbedder {
    config: VoyageConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl VoyageEmbedder {
    pub fn new(config: VoyageConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = json!({
            "input": [text],
            "model": self.config.model,
            "input_type": "query",
            "truncation": true,
            "output_dimension": self.config.dimension,
        });

        let resp = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(EmbeddingError::RateLimited {
                provider: PROVIDER.into(),
                retry_after,
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
            EmbeddingError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            }
        })?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: "empty data array".into(),
            })?;

        check_dimension(self.config.dimension, &vector)?;
        Ok(vector)
    }
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Random exponential backoff: uniform in `[0, min(2^attempt s, 60 s)]`.
fn backoff_delay(attempt: u32) -> Duration {
    let ceiling = Duration::from_secs(1u64 << attempt.min(6)).min(MAX_BACKOFF);
    let millis = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Server-provided Retry-After if any, else backoff. Never above the ceiling.
fn retry_delay(retry_after: Option<Duration>, attempt: u32) -> Duration {
    retry_after
        .unwrap_or_else(|| backoff_delay(attempt))
        .min(MAX_BACKOFF)
}

#[async_trait]
impl Embedder for VoyageEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.request_once(text).await {
                Err(EmbeddingError::RateLimited { retry_after, .. })
                    if attempt < self.config.max_retries =>
                {
                    let delay = retry_delay(retry_after, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Voyage rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(vector) => {
                    debug!(dimension = vector.len(), "Embedding generated");
                    return Ok(vector);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
