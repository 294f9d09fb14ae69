//! Tier router: classification + KB match + lead context → handling tier.
//!
//! Routing is a fold over an ordered list of pure rule checks. Each check
//! may append factors to the log and may decide a tier; the first decision
//! wins. With no decision the reply is drafted for approval (tier 2).
//!
//! All threshold comparisons are written so that NaN inputs fail the
//! "safe" side and end up escalated rather than auto-sent.

use std::ops::ControlFlow;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::RouterConfig;
use crate::pipeline::types::{
    Classification, Complexity, FactorDirection, Intent, KbMatch, LeadContext, RoutingFactor,
    Tier, TierRouting,
};

/// Reason used when no rule decides.
pub const DEFAULT_REASON: &str = "KB match requires approval";

/// Everything the router looks at for one reply.
#[derive(Debug, Clone, Copy)]
pub struct RoutingInput<'a> {
    pub classification: &'a Classification,
    pub kb_match: Option<&'a KbMatch>,
    pub lead_context: Option<&'a LeadContext>,
}

impl<'a> RoutingInput<'a> {
    pub fn new(classification: &'a Classification) -> Self {
        Self {
            classification,
            kb_match: None,
            lead_context: None,
        }
    }

    pub fn with_match(mut self, kb_match: Option<&'a KbMatch>) -> Self {
        self.kb_match = kb_match;
        self
    }

    pub fn with_lead(mut self, lead_context: Option<&'a LeadContext>) -> Self {
        self.lead_context = lead_context;
        self
    }

    fn deal_value(&self) -> Option<f64> {
        self.lead_context.and_then(|l| l.deal_value)
    }

    fn lead_score(&self) -> Option<f64> {
        self.lead_context.and_then(|l| l.lead_score)
    }
}

/// A tier chosen by one rule.
#[derive(Debug, Clone, PartialEq)]
struct Decision {
    tier: Tier,
    reason: String,
    is_override: bool,
}

/// What one rule check contributes.
#[derive(Debug, Clone, Default, PartialEq)]
struct RuleOutcome {
    factors: Vec<RoutingFactor>,
    decision: Option<Decision>,
}

impl RuleOutcome {
    fn pass() -> Self {
        Self::default()
    }

    fn note(factor: RoutingFactor) -> Self {
        Self {
            factors: vec![factor],
            decision: None,
        }
    }

    fn decide(factor: RoutingFactor, tier: Tier, reason: String) -> Self {
        Self {
            factors: vec![factor],
            decision: Some(Decision {
                tier,
                reason,
                is_override: false,
            }),
        }
    }

    fn escalate_override(factor: RoutingFactor, reason: String) -> Self {
        Self {
            factors: vec![factor],
            decision: Some(Decision {
                tier: Tier::Escalate,
                reason,
                is_override: true,
            }),
        }
    }
}

type RuleCheck = fn(&RouterConfig, &RoutingInput<'_>) -> RuleOutcome;

/// Evaluation order. Overrides, then tier 1, then escalations.
const RULES: &[RuleCheck] = &[
    always_escalate_intent,
    high_value_deal,
    auto_respond_intent,
    confident_positive_interest,
    negative_sentiment,
    complex_reply,
    insufficient_kb_match,
    unclear_intent,
    high_value_lead_declined,
];

// ── Overrides ───────────────────────────────────────────────────────

fn always_escalate_intent(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    let intent = input.classification.intent;
    if !config.always_escalate_intents.contains(&intent) {
        return RuleOutcome::pass();
    }
    RuleOutcome::escalate_override(
        RoutingFactor::new("always_escalate_intent", intent.as_str(), 1.0, FactorDirection::Tier3),
        format!("Intent '{intent}' is configured to always escalate"),
    )
}

fn high_value_deal(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    match input.deal_value() {
        Some(value) if value >= config.high_value_deal_threshold => RuleOutcome::escalate_override(
            RoutingFactor::new("high_value_deal", value, 1.0, FactorDirection::Tier3),
            format!(
                "High-value deal ({value:.0} >= {:.0}) requires human handling",
                config.high_value_deal_threshold
            ),
        ),
        _ => RuleOutcome::pass(),
    }
}

// ── Tier 1 ──────────────────────────────────────────────────────────

fn auto_respond_intent(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    let intent = input.classification.intent;
    if !config.auto_respond_intents.contains(&intent) {
        return RuleOutcome::pass();
    }
    RuleOutcome::decide(
        RoutingFactor::new("auto_respond_intent", intent.as_str(), 1.0, FactorDirection::Tier1),
        Tier::AutoRespond,
        format!("Auto-respond intent '{intent}'"),
    )
}

fn confident_positive_interest(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    if input.classification.intent != Intent::PositiveInterest {
        return RuleOutcome::pass();
    }
    let Some(kb_match) = input.kb_match else {
        return RuleOutcome::pass();
    };

    let confidence = kb_match.confidence;
    if confidence >= config.tier1_min_confidence {
        return RuleOutcome::decide(
            RoutingFactor::new("kb_confidence", confidence, 0.9, FactorDirection::Tier1),
            Tier::AutoRespond,
            format!("Positive interest with high-confidence KB match ({confidence:.2})"),
        );
    }
    RuleOutcome::note(RoutingFactor::new(
        "kb_confidence_below_tier1",
        confidence,
        0.3,
        FactorDirection::Tier2,
    ))
}

// ── Escalations ─────────────────────────────────────────────────────

fn negative_sentiment(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    let sentiment = input.classification.sentiment;
    if sentiment >= config.negative_sentiment_threshold {
        return RuleOutcome::pass();
    }
    RuleOutcome::decide(
        RoutingFactor::new("negative_sentiment", sentiment, 0.8, FactorDirection::Tier3),
        Tier::Escalate,
        format!("Negative sentiment ({sentiment:.2})"),
    )
}

fn complex_reply(_config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    if input.classification.complexity != Complexity::Complex {
        return RuleOutcome::pass();
    }
    RuleOutcome::decide(
        RoutingFactor::new("complexity", "complex", 0.7, FactorDirection::Tier3),
        Tier::Escalate,
        "Reply is too complex for a templated response".into(),
    )
}

fn insufficient_kb_match(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    match input.kb_match {
        None => RuleOutcome::decide(
            RoutingFactor::new("kb_match", serde_json::Value::Null, 0.9, FactorDirection::Tier3),
            Tier::Escalate,
            "No KB match found".into(),
        ),
        Some(m) if m.confidence >= config.tier2_min_confidence => RuleOutcome::pass(),
        Some(m) => RuleOutcome::decide(
            RoutingFactor::new("kb_confidence", m.confidence, 0.9, FactorDirection::Tier3),
            Tier::Escalate,
            format!(
                "KB match confidence {:.2} below minimum {:.2}",
                m.confidence, config.tier2_min_confidence
            ),
        ),
    }
}

fn unclear_intent(_config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    if input.classification.intent != Intent::Unclear {
        return RuleOutcome::pass();
    }
    RuleOutcome::decide(
        RoutingFactor::new("intent", Intent::Unclear.as_str(), 0.6, FactorDirection::Tier3),
        Tier::Escalate,
        "Intent unclear".into(),
    )
}

fn high_value_lead_declined(config: &RouterConfig, input: &RoutingInput<'_>) -> RuleOutcome {
    if input.classification.intent != Intent::NotInterested {
        return RuleOutcome::pass();
    }
    match input.lead_score() {
        Some(score) if score >= config.high_value_lead_score => RuleOutcome::decide(
            RoutingFactor::new("high_value_lead", score, 0.7, FactorDirection::Tier3),
            Tier::Escalate,
            format!("High-value lead (score {score:.0}) is not interested"),
        ),
        _ => RuleOutcome::pass(),
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Deterministic tier router.
#[derive(Debug, Clone, Default)]
pub struct TierRouter {
    config: RouterConfig,
}

impl TierRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RouterConfig) {
        self.config = config;
    }

    /// Route one reply. Never fails.
    pub fn route(&self, input: &RoutingInput<'_>) -> TierRouting {
        let folded = RULES.iter().try_fold(Vec::new(), |mut log, check| {
            let outcome = check(&self.config, input);
            log.extend(outcome.factors);
            match outcome.decision {
                Some(decision) => ControlFlow::Break((log, decision)),
                None => ControlFlow::Continue(log),
            }
        });

        let (factors, decision) = match folded {
            ControlFlow::Break(decided) => decided,
            ControlFlow::Continue(mut log) => {
                log.push(RoutingFactor::new(
                    "kb_confidence",
                    input.kb_match.map(|m| m.confidence),
                    0.8,
                    FactorDirection::Tier2,
                ));
                let decision = Decision {
                    tier: Tier::Draft,
                    reason: DEFAULT_REASON.into(),
                    is_override: false,
                };
                (log, decision)
            }
        };

        debug!(factors = factors.len(), "Routing rules evaluated");
        info!(
            intent = %input.classification.intent,
            tier = decision.tier.number(),
            override_applied = decision.is_override,
            reason = %decision.reason,
            "Reply routed"
        );

        TierRouting {
            tier: decision.tier,
            override_reason: decision.is_override.then(|| decision.reason.clone()),
            override_applied: decision.is_override,
            reason: decision.reason,
            factors,
            routed_at: Utc::now(),
        }
    }
}

/// How strongly the recorded factors agree with the decided tier.
///
/// Weighted average of 1.0 per factor pointing at the decided tier, 0.5 per
/// neutral factor and 0.2 otherwise. 0.5 when there is nothing to weigh.
pub fn calculate_routing_confidence(routing: &TierRouting) -> f64 {
    let expected = routing.tier.direction();
    let (weighted, total) = routing
        .factors
        .iter()
        .fold((0.0, 0.0), |(weighted, total), f| {
            let agreement = if f.direction == expected {
                1.0
            } else if f.direction == FactorDirection::Neutral {
                0.5
            } else {
                0.2
            };
            (weighted + f.weight * agreement, total + f.weight)
        });

    if total > 0.0 { weighted / total } else { 0.5 }
}
