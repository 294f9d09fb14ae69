//! Triage orchestrator: one raw reply in, one routed outcome out.
//!
//! Flow:
//! 1. Extract new content from the raw body
//! 2. Detect auto-reply keywords (recorded on the outcome, never decisive)
//! 3. Classify via the injected [`ReplyClassifier`]
//! 4. Match against the tenant's knowledge base
//! 5. Route to a tier

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::email::{
    AutoReplyDetection, ParseOptions, ParsedEmail, detect_auto_reply, parse_email_reply,
};
use crate::error::TriageError;
use crate::kb::{KbMatcher, MatchRequest};
use crate::pipeline::router::{RoutingInput, TierRouter};
use crate::pipeline::types::{Classification, KbMatch, LeadContext, Tier, TierRouting};

/// Intent classification boundary, usually an LLM call.
#[async_trait]
pub trait ReplyClassifier: Send + Sync {
    async fn classify(&self, content: &str) -> Result<Classification, TriageError>;
}

/// Returns the same classification for every reply.
#[derive(Debug, Clone)]
pub struct StaticClassifier(pub Classification);

#[async_trait]
impl ReplyClassifier for StaticClassifier {
    async fn classify(&self, _content: &str) -> Result<Classification, TriageError> {
        Ok(self.0.clone())
    }
}

/// One reply to triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub raw_body: String,
    pub tenant_id: String,
    #[serde(default)]
    pub lead_context: Option<LeadContext>,
}

/// Everything decided about one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub id: Uuid,
    pub parsed: ParsedEmail,
    pub auto_reply: AutoReplyDetection,
    pub classification: Classification,
    pub kb_match: Option<KbMatch>,
    pub routing: TierRouting,
}

pub struct TriagePipeline {
    classifier: Arc<dyn ReplyClassifier>,
    matcher: Option<KbMatcher>,
    router: TierRouter,
    parse_options: ParseOptions,
}

impl TriagePipeline {
    pub fn new(classifier: Arc<dyn ReplyClassifier>, matcher: KbMatcher, router: TierRouter) -> Self {
        Self {
            classifier,
            matcher: Some(matcher),
            router,
            parse_options: ParseOptions::default(),
        }
    }

    /// Pipeline that routes without knowledge base lookups.
    pub fn without_kb(classifier: Arc<dyn ReplyClassifier>, router: TierRouter) -> Self {
        Self {
            classifier,
            matcher: None,
            router,
            parse_options: ParseOptions::default(),
        }
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    pub fn router(&self) -> &TierRouter {
        &self.router
    }

    /// Triage one reply. Classifier and KB failures propagate.
    pub async fn triage(&self, request: &TriageRequest) -> Result<TriageOutcome, TriageError> {
        let id = Uuid::new_v4();
        let parsed = parse_email_reply(&request.raw_body, &self.parse_options);
        let auto_reply = detect_auto_reply(&parsed.new_content);

        debug!(
            %id,
            original_length = parsed.original_length,
            parsed_length = parsed.parsed_length,
            had_quotes = parsed.had_quotes,
            "Reply extracted"
        );

        if let Some(kind) = auto_reply.kind {
            debug!(%id, kind = ?kind, "Auto-reply keywords present");
        }
        let classification = self.classifier.classify(&parsed.new_content).await?;

        let kb_match = self.find_match(request, &parsed, &classification).await?;

        let routing = self.router.route(
            &RoutingInput::new(&classification)
                .with_match(kb_match.as_ref())
                .with_lead(request.lead_context.as_ref()),
        );

        info!(
            %id,
            tenant_id = %request.tenant_id,
            intent = %classification.intent,
            tier = routing.tier.number(),
            kb_confidence = kb_match.as_ref().map(|m| m.confidence),
            "Reply triaged"
        );

        Ok(TriageOutcome {
            id,
            parsed,
            auto_reply,
            classification,
            kb_match,
            routing,
        })
    }

    /// Triage several replies concurrently.
    ///
    /// Results follow input order. A failed reply does not fail the batch.
    pub async fn triage_batch(
        &self,
        requests: &[TriageRequest],
    ) -> Vec<Result<TriageOutcome, TriageError>> {
        info!(count = requests.len(), "Triaging reply batch");
        let results =
            futures::future::join_all(requests.iter().map(|r| self.triage(r))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some replies failed triage");
        }
        results
    }

    /// Tier 1 without a KB match is only executable for auto-respond intents.
    pub fn ensure_tier_one_executable(&self, outcome: &TriageOutcome) -> Result<(), TriageError> {
        let intent = outcome.classification.intent;
        if outcome.routing.tier == Tier::AutoRespond
            && outcome.kb_match.is_none()
            && !self.router.config().auto_respond_intents.contains(&intent)
        {
            return Err(TriageError::MissingKbMatch {
                intent: intent.to_string(),
            });
        }
        Ok(())
    }

    async fn find_match(
        &self,
        request: &TriageRequest,
        parsed: &ParsedEmail,
        classification: &Classification,
    ) -> Result<Option<KbMatch>, TriageError> {
        let Some(matcher) = &self.matcher else {
            return Ok(None);
        };
        if parsed.new_content.is_empty() {
            debug!(tenant_id = %request.tenant_id, "Empty reply, skipping KB match");
            return Ok(None);
        }

        let kb_match = matcher
            .find_match(&MatchRequest {
                classification: classification.clone(),
                reply_text: parsed.new_content.clone(),
                tenant_id: request.tenant_id.clone(),
            })
            .await?;
        Ok(kb_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::email::AutoReplyKind;
    use crate::pipeline::types::{Complexity, Intent, Urgency};

    use crate::config::{MatcherConfig, RouterConfig};
    use crate::kb::memory::{Document, InMemoryStore};
    use crate::kb::store::Embedder;
    use crate::error::EmbeddingError;
    use serde_json::json;

    const TENANT: &str = "brain_saas_v1";

    fn classification(intent: Intent) -> Classification {
        Classification {
            intent,
            intent_confidence: 0.9,
            sentiment: 0.3,
            complexity: Complexity::Simple,
            urgency: Urgency::Medium,
            reply_type: "interest".into(),
        }
    }

    /// Counts calls so tests can check the classifier was skipped.
    struct CountingClassifier {
        classification: Classification,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReplyClassifier for CountingClassifier {
        async fn classify(&self, _content: &str) -> Result<Classification, TriageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.classification.clone())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ReplyClassifier for FailingClassifier {
        async fn classify(&self, _content: &str) -> Result<Classification, TriageError> {
            Err(TriageError::Classification("model unavailable".into()))
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }
    }

    async fn matcher_with_template(vector: Vec<f32>) -> KbMatcher {
        let store = InMemoryStore::new();
        store
            .upsert(
                "response_templates",
                Document {
                    id: "tpl-interest".into(),
                    vector,
                    payload: json!({
                        "brain_id": TENANT,
                        "reply_type": "interest",
                        "template_text": "Great to hear, {{first_name}}!"
                    }),
                },
            )
            .await;
        KbMatcher::new(Arc::new(UnitEmbedder), Arc::new(store), MatcherConfig::default())
    }

    fn request(body: &str) -> TriageRequest {
        TriageRequest {
            raw_body: body.into(),
            tenant_id: TENANT.into(),
            lead_context: None,
        }
    }

    // ── Happy path ──────────────────────────────────────────────────

    #[tokio::test]
    async fn positive_reply_with_strong_match_is_tier_one() {
        let pipeline = TriagePipeline::new(
            Arc::new(StaticClassifier(classification(Intent::PositiveInterest))),
            matcher_with_template(vec![1.0, 0.0]).await,
            TierRouter::default(),
        );
        let outcome = pipeline
            .triage(&request(
                "Yes, I'd love to learn more!\n\nOn Mon, Jan 6, 2025 at 9:00 AM Sam <sam@acme.io> wrote:\n> Hi there",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.parsed.new_content, "Yes, I'd love to learn more!");
        assert!(outcome.parsed.had_quotes);
        let kb_match = outcome.kb_match.as_ref().unwrap();
        assert_eq!(kb_match.id, "tpl-interest");
        assert!((kb_match.confidence - 1.0).abs() < 1e-6);
        assert_eq!(outcome.routing.tier, Tier::AutoRespond);
        assert!(pipeline.ensure_tier_one_executable(&outcome).is_ok());
    }

    #[tokio::test]
    async fn unmatched_question_escalates() {
        // Near-orthogonal template scores below min_score on both attempts.
        let pipeline = TriagePipeline::new(
            Arc::new(StaticClassifier(classification(Intent::Question))),
            matcher_with_template(vec![0.1, 1.0]).await,
            TierRouter::default(),
        );
        let outcome = pipeline.triage(&request("How does it work?")).await.unwrap();
        assert!(outcome.kb_match.is_none());
        assert_eq!(outcome.routing.tier, Tier::Escalate);
    }

    // ── Auto replies ────────────────────────────────────────────────

    #[tokio::test]
    async fn vacation_mention_is_still_classified() {
        let classifier = Arc::new(CountingClassifier {
            classification: classification(Intent::PositiveInterest),
            calls: AtomicUsize::new(0),
        });
        let pipeline = TriagePipeline::without_kb(
            Arc::clone(&classifier) as Arc<dyn ReplyClassifier>,
            TierRouter::default(),
        );

        let outcome = pipeline
            .triage(&request(
                "Very interested! I'm on vacation next week but will be back on the 14th, can we book a demo then?",
            ))
            .await
            .unwrap();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.auto_reply.kind, Some(AutoReplyKind::OutOfOffice));
        assert_eq!(outcome.classification.intent, Intent::PositiveInterest);
        assert_ne!(outcome.routing.tier, Tier::AutoRespond);
    }

    #[tokio::test]
    async fn bounce_wording_in_human_reply_is_still_classified() {
        let classifier = Arc::new(CountingClassifier {
            classification: classification(Intent::Question),
            calls: AtomicUsize::new(0),
        });
        let pipeline = TriagePipeline::without_kb(
            Arc::clone(&classifier) as Arc<dyn ReplyClassifier>,
            TierRouter::default(),
        );

        let outcome = pipeline
            .triage(&request(
                "Our last vendor's mail was returned as undeliverable, so please call me instead.",
            ))
            .await
            .unwrap();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.auto_reply.kind, Some(AutoReplyKind::Bounce));
        assert_eq!(outcome.classification.intent, Intent::Question);
        assert_eq!(outcome.routing.tier, Tier::Escalate);
    }

    // ── Errors ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn classifier_failure_propagates() {
        let pipeline = TriagePipeline::without_kb(Arc::new(FailingClassifier), TierRouter::default());
        let err = pipeline.triage(&request("Tell me more")).await.unwrap_err();
        assert!(matches!(err, TriageError::Classification(_)));
    }

    #[tokio::test]
    async fn invalid_tenant_propagates_as_kb_error() {
        let pipeline = TriagePipeline::new(
            Arc::new(StaticClassifier(classification(Intent::Question))),
            matcher_with_template(vec![1.0, 0.0]).await,
            TierRouter::default(),
        );
        let mut req = request("Tell me more");
        req.tenant_id = "acme".into();
        let err = pipeline.triage(&req).await.unwrap_err();
        assert!(matches!(err, TriageError::Kb(_)));
    }

    #[test]
    fn tier_one_without_match_is_rejected_for_other_intents() {
        let pipeline = TriagePipeline::without_kb(
            Arc::new(StaticClassifier(classification(Intent::PositiveInterest))),
            TierRouter::new(RouterConfig::default()),
        );
        let c = classification(Intent::PositiveInterest);
        let mut routing = pipeline.router().route(&RoutingInput::new(&c));
        routing.tier = Tier::AutoRespond;
        let outcome = TriageOutcome {
            id: Uuid::new_v4(),
            parsed: parse_email_reply("Sounds good", &ParseOptions::default()),
            auto_reply: detect_auto_reply("Sounds good"),
            classification: c,
            kb_match: None,
            routing,
        };
        let err = pipeline.ensure_tier_one_executable(&outcome).unwrap_err();
        assert!(matches!(err, TriageError::MissingKbMatch { ref intent } if intent == "positive_interest"));
    }

    // ── Batch ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let pipeline = TriagePipeline::new(
            Arc::new(StaticClassifier(classification(Intent::PositiveInterest))),
            matcher_with_template(vec![1.0, 0.0]).await,
            TierRouter::default(),
        );
        let mut bad = request("Interested");
        bad.tenant_id = "bad tenant".into();
        let results = pipeline
            .triage_batch(&[request("Count me in"), bad, request("")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().routing.tier, Tier::AutoRespond);
        assert!(results[1].is_err());
        let empty = results[2].as_ref().unwrap();
        assert!(empty.kb_match.is_none());
        assert_eq!(empty.routing.tier, Tier::Escalate);
    }
}
