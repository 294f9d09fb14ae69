//! Knowledge base matcher: best template or objection handler for a reply.
//!
//! Flow per call:
//! 1. embed the reply text once
//! 2. run an ordered list of searches, most specific filter first
//! 3. accept the first candidate at or above `min_score`, scaled by the
//!    penalty of the search that found it
//!
//! Backend failures propagate; only [`KbMatcher::check_health`] absorbs them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MatcherConfig;
use crate::error::KbError;
use crate::kb::store::{Embedder, Filter, ScoredPoint, SearchRequest, VectorStore};
use crate::kb::validate_tenant_id;
use crate::pipeline::types::{Classification, Intent, KbMatch, KbMatchKind, Tier};

/// Minimum confidence for a tier-1 match.
pub const TIER1_MIN_CONFIDENCE: f64 = 0.85;
/// Minimum confidence for a tier-2 match.
pub const TIER2_MIN_CONFIDENCE: f64 = 0.50;

// ── Objection types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectionType {
    Budget,
    Timing,
    Authority,
    Competitor,
}

impl ObjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Timing => "timing",
            Self::Authority => "authority",
            Self::Competitor => "competitor",
        }
    }
}

/// Keyword families in evaluation order.
const OBJECTION_KEYWORDS: [(ObjectionType, &[&str]); 4] = [
    (
        ObjectionType::Budget,
        &[
            "budget",
            "pricing",
            "price",
            "expensive",
            "cost",
            "afford",
            "too much",
            "cheaper",
            "no money",
        ],
    ),
    (
        ObjectionType::Timing,
        &[
            "not now",
            "not right now",
            "bad time",
            "not the right time",
            "timing",
            "next quarter",
            "next year",
            "in a few months",
            "circle back",
            "revisit",
            "too busy",
            "later this year",
        ],
    ),
    (
        ObjectionType::Authority,
        &[
            "decision maker",
            "decision-maker",
            "not my call",
            "not my decision",
            "my boss",
            "my manager",
            "not the right person",
            "need approval",
            "sign off",
            "sign-off",
            "procurement",
            "leadership team",
        ],
    ),
    (
        ObjectionType::Competitor,
        &[
            "competitor",
            "already use",
            "already using",
            "already have a",
            "current vendor",
            "current provider",
            "went with",
            "happy with our",
            "another solution",
            "locked into",
            "under contract",
        ],
    ),
];

/// Guess the objection family from reply text. First family with a hit wins.
pub fn detect_objection_type(text: &str) -> Option<ObjectionType> {
    let lower = text.to_lowercase();
    OBJECTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(kind, _)| *kind)
}

// ── Tier helpers ────────────────────────────────────────────────────

/// Whether `kb_match` falls in the confidence band of `tier`.
pub fn is_eligible_for_tier(kb_match: &KbMatch, tier: Tier) -> bool {
    let c = kb_match.confidence;
    match tier {
        Tier::AutoRespond => c >= TIER1_MIN_CONFIDENCE,
        Tier::Draft => (TIER2_MIN_CONFIDENCE..TIER1_MIN_CONFIDENCE).contains(&c),
        Tier::Escalate => !(c >= TIER2_MIN_CONFIDENCE),
    }
}

/// Tier suggested by match confidence alone; no match means tier 3.
pub fn recommended_tier(kb_match: Option<&KbMatch>) -> Tier {
    match kb_match {
        Some(m) if m.confidence >= TIER1_MIN_CONFIDENCE => Tier::AutoRespond,
        Some(m) if m.confidence >= TIER2_MIN_CONFIDENCE => Tier::Draft,
        _ => Tier::Escalate,
    }
}

// ── Matcher ─────────────────────────────────────────────────────────

/// Input for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub classification: Classification,
    pub reply_text: String,
    pub tenant_id: String,
}

/// Tenant-scoped document counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbHealth {
    pub healthy: bool,
    pub template_count: u64,
    pub handler_count: u64,
}

impl KbHealth {
    fn unhealthy() -> Self {
        Self {
            healthy: false,
            template_count: 0,
            handler_count: 0,
        }
    }
}

/// One search in a fallback chain.
#[derive(Debug, Clone, PartialEq)]
struct SearchAttempt {
    filter: Filter,
    /// Multiplier applied to the accepted score.
    penalty: f64,
}

/// What to search for and in which order.
#[derive(Debug, Clone, PartialEq)]
struct SearchPlan {
    kind: KbMatchKind,
    collection: String,
    attempts: Vec<SearchAttempt>,
}

/// Finds the single best KB document for a classified reply.
pub struct KbMatcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: MatcherConfig,
}

impl KbMatcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Best match for a reply, or `None` if nothing clears `min_score`.
    pub async fn find_match(&self, request: &MatchRequest) -> Result<Option<KbMatch>, KbError> {
        if !validate_tenant_id(&request.tenant_id) {
            return Err(KbError::InvalidTenant(request.tenant_id.clone()));
        }

        let plan = self.plan(request);
        let vector = self.embedder.embed(&request.reply_text).await?;

        for (idx, attempt) in plan.attempts.iter().enumerate() {
            let hits = self
                .store
                .search(
                    &plan.collection,
                    SearchRequest {
                        vector: vector.clone(),
                        limit: self.config.top_k,
                        filter: attempt.filter.clone(),
                        with_payload: true,
                    },
                )
                .await?;

            let best = hits.into_iter().find(|h| h.score >= self.config.min_score);
            if let Some(hit) = best {
                let kb_match = build_match(plan.kind, hit, attempt.penalty);
                info!(
                    tenant_id = %request.tenant_id,
                    collection = %plan.collection,
                    id = %kb_match.id,
                    confidence = kb_match.confidence,
                    fallback = idx > 0,
                    "KB match found"
                );
                return Ok(Some(kb_match));
            }

            debug!(
                tenant_id = %request.tenant_id,
                collection = %plan.collection,
                attempt = idx,
                "No candidate above minimum score"
            );
        }

        Ok(None)
    }

    /// Match several replies concurrently. Output order follows input order.
    pub async fn match_batch(
        &self,
        requests: &[MatchRequest],
    ) -> Result<Vec<Option<KbMatch>>, KbError> {
        futures::future::try_join_all(requests.iter().map(|r| self.find_match(r))).await
    }

    /// Count tenant documents in both collections. Never fails.
    pub async fn check_health(&self, tenant_id: &str) -> KbHealth {
        if !validate_tenant_id(tenant_id) {
            warn!(tenant_id, "KB health check for invalid tenant id");
            return KbHealth::unhealthy();
        }

        let filter = self.tenant_filter(tenant_id);
        let counts = futures::try_join!(
            self.store.count(&self.config.template_collection, &filter),
            self.store.count(&self.config.handler_collection, &filter),
        );

        match counts {
            Ok((template_count, handler_count)) => KbHealth {
                healthy: template_count > 0 || handler_count > 0,
                template_count,
                handler_count,
            },
            Err(e) => {
                warn!(tenant_id, error = %e, "KB health check failed");
                KbHealth::unhealthy()
            }
        }
    }

    fn tenant_filter(&self, tenant_id: &str) -> Filter {
        Filter::new().with(&self.config.tenant_field, tenant_id)
    }

    /// Objection intents search handlers; everything else searches templates.
    fn plan(&self, request: &MatchRequest) -> SearchPlan {
        let tenant = self.tenant_filter(&request.tenant_id);

        if request.classification.intent == Intent::Objection {
            let attempts = match detect_objection_type(&request.reply_text) {
                Some(objection) => vec![
                    SearchAttempt {
                        filter: tenant.clone().with("objection_type", objection.as_str()),
                        penalty: 1.0,
                    },
                    SearchAttempt {
                        filter: tenant,
                        penalty: self.config.objection_fallback_penalty,
                    },
                ],
                None => vec![SearchAttempt {
                    filter: tenant,
                    penalty: 1.0,
                }],
            };
            return SearchPlan {
                kind: KbMatchKind::Handler,
                collection: self.config.handler_collection.clone(),
                attempts,
            };
        }

        SearchPlan {
            kind: KbMatchKind::Template,
            collection: self.config.template_collection.clone(),
            attempts: vec![
                SearchAttempt {
                    filter: tenant
                        .clone()
                        .with("reply_type", request.classification.reply_type.as_str()),
                    penalty: 1.0,
                },
                SearchAttempt {
                    filter: tenant,
                    penalty: self.config.fallback_penalty,
                },
            ],
        }
    }
}

fn build_match(kind: KbMatchKind, hit: ScoredPoint, penalty: f64) -> KbMatch {
    let confidence = (hit.score * penalty).clamp(0.0, 1.0);
    match kind {
        KbMatchKind::Template => KbMatch {
            kind,
            content: hit
                .payload_str("template_text")
                .or_else(|| hit.payload_str("content"))
                .unwrap_or_default()
                .to_string(),
            strategy: None,
            personalization_instructions: hit
                .payload_str("personalization_instructions")
                .map(str::to_string),
            variables: hit.payload_strings("variables"),
            follow_up_actions: Vec::new(),
            confidence,
            id: hit.id,
        },
        KbMatchKind::Handler => KbMatch {
            kind,
            content: hit
                .payload_str("handler_response")
                .or_else(|| hit.payload_str("response"))
                .or_else(|| hit.payload_str("handler_template"))
                .unwrap_or_default()
                .to_string(),
            strategy: hit.payload_str("handler_strategy").map(str::to_string),
            personalization_instructions: None,
            variables: hit.payload_strings("variables"),
            follow_up_actions: hit.payload_strings("follow_up_actions"),
            confidence,
            id: hit.id,
        },
    }
}
