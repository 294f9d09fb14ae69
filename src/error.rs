//! Error types for reply triage.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Embedding service errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Knowledge base (vector store) errors.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("Invalid tenant id: {0}")]
    InvalidTenant(String),

    #[error("Search in {collection} failed: {reason}")]
    Search { collection: String, reason: String },

    #[error("Count in {collection} failed: {reason}")]
    Count { collection: String, reason: String },

    #[error("Invalid response from vector store: {0}")]
    InvalidResponse(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Orchestration errors for a full triage call.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Knowledge base lookup failed: {0}")]
    Kb(#[from] KbError),

    #[error("Tier 1 requires a KB match for intent {intent}")]
    MissingKbMatch { intent: String },
}
