//! Configuration types.
//!
//! Every struct has a `Default` with the production thresholds and a
//! `from_env()` that overlays environment variables. Unparseable numeric
//! values fall back to the default.

use std::str::FromStr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::types::Intent;

/// Read `key` and parse it, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated intent list, skipping unknown names.
fn parse_intent_list(raw: &str) -> Vec<Intent> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let intent = Intent::parse(s);
            if intent.is_none() {
                tracing::warn!(value = %s, "Ignoring unknown intent in configuration");
            }
            intent
        })
        .collect()
}

// ── Router ──────────────────────────────────────────────────────────

/// Intents that are always auto-responded (tier 1), no KB match needed.
pub const DEFAULT_AUTO_RESPOND_INTENTS: [Intent; 3] =
    [Intent::OutOfOffice, Intent::Bounce, Intent::Unsubscribe];

/// Thresholds and intent lists for the tier router.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Minimum KB confidence for tier 1.
    pub tier1_min_confidence: f64,
    /// Minimum KB confidence for tier 2. Below this the reply escalates.
    pub tier2_min_confidence: f64,
    /// Sentiment strictly below this escalates.
    pub negative_sentiment_threshold: f64,
    /// Deal value at or above this always escalates.
    pub high_value_deal_threshold: f64,
    /// Lead score at or above this escalates a `not_interested` reply.
    pub high_value_lead_score: f64,
    /// Intents that always escalate to tier 3.
    pub always_escalate_intents: Vec<Intent>,
    /// Intents that are always tier 1.
    pub auto_respond_intents: Vec<Intent>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tier1_min_confidence: 0.85,
            tier2_min_confidence: 0.50,
            negative_sentiment_threshold: -0.3,
            high_value_deal_threshold: 100_000.0,
            high_value_lead_score: 70.0,
            always_escalate_intents: Vec::new(),
            auto_respond_intents: DEFAULT_AUTO_RESPOND_INTENTS.to_vec(),
        }
    }
}

impl RouterConfig {
    /// Defaults with `overrides` merged on top.
    pub fn with_overrides(overrides: RouterConfigOverrides) -> Self {
        Self::default().merge(overrides)
    }

    /// Merge set fields of `overrides` over `self`.
    ///
    /// Extra auto-respond intents are added to the existing list rather
    /// than replacing it.
    pub fn merge(mut self, overrides: RouterConfigOverrides) -> Self {
        if let Some(v) = overrides.tier1_min_confidence {
            self.tier1_min_confidence = v;
        }
        if let Some(v) = overrides.tier2_min_confidence {
            self.tier2_min_confidence = v;
        }
        if let Some(v) = overrides.negative_sentiment_threshold {
            self.negative_sentiment_threshold = v;
        }
        if let Some(v) = overrides.high_value_deal_threshold {
            self.high_value_deal_threshold = v;
        }
        if let Some(v) = overrides.high_value_lead_score {
            self.high_value_lead_score = v;
        }
        if let Some(intents) = overrides.always_escalate_intents {
            self.always_escalate_intents = intents;
        }
        for intent in overrides.additional_auto_respond_intents {
            if !self.auto_respond_intents.contains(&intent) {
                self.auto_respond_intents.push(intent);
            }
        }
        self
    }

    /// Build from environment variables over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let overrides = RouterConfigOverrides {
            tier1_min_confidence: Some(env_or(
                "TRIAGE_TIER1_MIN_CONFIDENCE",
                defaults.tier1_min_confidence,
            )),
            tier2_min_confidence: Some(env_or(
                "TRIAGE_TIER2_MIN_CONFIDENCE",
                defaults.tier2_min_confidence,
            )),
            negative_sentiment_threshold: Some(env_or(
                "TRIAGE_NEGATIVE_SENTIMENT_THRESHOLD",
                defaults.negative_sentiment_threshold,
            )),
            high_value_deal_threshold: Some(env_or(
                "TRIAGE_HIGH_VALUE_DEAL",
                defaults.high_value_deal_threshold,
            )),
            high_value_lead_score: Some(env_or(
                "TRIAGE_HIGH_VALUE_LEAD_SCORE",
                defaults.high_value_lead_score,
            )),
            always_escalate_intents: std::env::var("TRIAGE_ALWAYS_ESCALATE")
                .ok()
                .map(|s| parse_intent_list(&s)),
            additional_auto_respond_intents: std::env::var("TRIAGE_AUTO_RESPOND")
                .map(|s| parse_intent_list(&s))
                .unwrap_or_default(),
        };
        defaults.merge(overrides)
    }
}

/// Partial router configuration; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouterConfigOverrides {
    pub tier1_min_confidence: Option<f64>,
    pub tier2_min_confidence: Option<f64>,
    pub negative_sentiment_threshold: Option<f64>,
    pub high_value_deal_threshold: Option<f64>,
    pub high_value_lead_score: Option<f64>,
    pub always_escalate_intents: Option<Vec<Intent>>,
    pub additional_auto_respond_intents: Vec<Intent>,
}

// ── Matcher ─────────────────────────────────────────────────────────

/// Knowledge base matcher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Minimum raw similarity for a candidate to be accepted.
    pub min_score: f64,
    /// Candidates fetched per search.
    pub top_k: usize,
    /// Score multiplier for template matches found without the reply-type filter.
    pub fallback_penalty: f64,
    /// Score multiplier for handler matches found without the objection-type filter.
    pub objection_fallback_penalty: f64,
    pub template_collection: String,
    pub handler_collection: String,
    /// Payload key holding the tenant (brain) id.
    pub tenant_field: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            top_k: 5,
            fallback_penalty: 0.9,
            objection_fallback_penalty: 0.85,
            template_collection: "response_templates".to_string(),
            handler_collection: "objection_handlers".to_string(),
            tenant_field: "brain_id".to_string(),
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_score: env_or("KB_MIN_SCORE", defaults.min_score),
            top_k: env_or("KB_TOP_K", defaults.top_k).max(1),
            ..defaults
        }
    }
}

// ── Qdrant ──────────────────────────────────────────────────────────

/// Qdrant REST endpoint configuration.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<SecretString>,
}

impl QdrantConfig {
    /// `QDRANT_URL`, or `http://{QDRANT_HOST}:{QDRANT_PORT}` (localhost:6333).
    pub fn from_env() -> Self {
        let url = std::env::var("QDRANT_URL").unwrap_or_else(|_| {
            let host = std::env::var("QDRANT_HOST").unwrap_or_else(|_| "localhost".into());
            let port: u16 = env_or("QDRANT_PORT", 6333);
            format!("http://{host}:{port}")
        });
        let api_key = std::env::var("QDRANT_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        Self { url, api_key }
    }
}

// ── Voyage embeddings ───────────────────────────────────────────────

/// Voyage AI embedding client configuration.
#[derive(Debug, Clone)]
pub struct VoyageConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    /// Expected vector dimensionality.
    pub dimension: usize,
    /// Retries on HTTP 429 before giving up.
    pub max_retries: u32,
}

impl VoyageConfig {
    pub const DEFAULT_MODEL: &'static str = "voyage-3.5-lite";
    pub const DEFAULT_DIMENSION: usize = 1024;

    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: "https://api.voyageai.com".to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            dimension: Self::DEFAULT_DIMENSION,
            max_retries: 5,
        }
    }

    /// Requires `VOYAGE_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("VOYAGE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("VOYAGE_API_KEY".into()))?;

        let mut config = Self::new(SecretString::from(api_key));
        if let Ok(model) = std::env::var("VOYAGE_MODEL") {
            config.model = model;
        }
        config.dimension = env_or("VOYAGE_DIMENSION", config.dimension);
        if config.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "VOYAGE_DIMENSION".into(),
                message: "must be greater than zero".into(),
            });
        }
        config.max_retries = env_or("VOYAGE_MAX_RETRIES", config.max_retries);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_defaults() {
        let c = RouterConfig::default();
        assert_eq!(c.tier1_min_confidence, 0.85);
        assert_eq!(c.tier2_min_confidence, 0.50);
        assert_eq!(c.negative_sentiment_threshold, -0.3);
        assert_eq!(c.high_value_lead_score, 70.0);
        assert!(c.always_escalate_intents.is_empty());
        assert_eq!(
            c.auto_respond_intents,
            vec![Intent::OutOfOffice, Intent::Bounce, Intent::Unsubscribe]
        );
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let c = RouterConfig::with_overrides(RouterConfigOverrides {
            tier1_min_confidence: Some(0.9),
            always_escalate_intents: Some(vec![Intent::Referral]),
            additional_auto_respond_intents: vec![Intent::Bounce, Intent::Referral],
            ..Default::default()
        });
        assert_eq!(c.tier1_min_confidence, 0.9);
        assert_eq!(c.tier2_min_confidence, 0.50);
        assert_eq!(c.always_escalate_intents, vec![Intent::Referral]);
        // Bounce already present; Referral appended once.
        assert_eq!(c.auto_respond_intents.len(), 4);
        assert_eq!(c.auto_respond_intents[3], Intent::Referral);
    }

    #[test]
    fn overrides_deserialize_from_json() {
        let o: RouterConfigOverrides = serde_json::from_str(
            r#"{"high_value_deal_threshold": 25000, "always_escalate_intents": ["referral"]}"#,
        )
        .unwrap();
        assert_eq!(o.high_value_deal_threshold, Some(25000.0));
        assert_eq!(o.always_escalate_intents, Some(vec![Intent::Referral]));
        assert!(o.tier1_min_confidence.is_none());
    }

    #[test]
    fn intent_list_skips_unknown() {
        let intents = parse_intent_list("bounce, nonsense ,,referral");
        assert_eq!(intents, vec![Intent::Bounce, Intent::Referral]);
    }

    #[test]
    fn matcher_defaults() {
        let c = MatcherConfig::default();
        assert_eq!(c.min_score, 0.5);
        assert_eq!(c.top_k, 5);
        assert_eq!(c.fallback_penalty, 0.9);
        assert_eq!(c.objection_fallback_penalty, 0.85);
        assert_eq!(c.tenant_field, "brain_id");
    }

    #[test]
    fn voyage_config_defaults() {
        let c = VoyageConfig::new(SecretString::from("pa-test"));
        assert_eq!(c.model, "voyage-3.5-lite");
        assert_eq!(c.dimension, 1024);
    }
}
