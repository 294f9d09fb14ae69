//! Shared types for the reply triage pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Classification ──────────────────────────────────────────────────

/// Intent of an inbound reply, as decided by the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PositiveInterest,
    Question,
    Objection,
    Referral,
    Unsubscribe,
    NotInterested,
    OutOfOffice,
    Bounce,
    Unclear,
}

impl Intent {
    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PositiveInterest => "positive_interest",
            Self::Question => "question",
            Self::Objection => "objection",
            Self::Referral => "referral",
            Self::Unsubscribe => "unsubscribe",
            Self::NotInterested => "not_interested",
            Self::OutOfOffice => "out_of_office",
            Self::Bounce => "bounce",
            Self::Unclear => "unclear",
        }
    }

    /// Parse a wire name. Unknown names return `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let intent = match s.trim().to_ascii_lowercase().as_str() {
            "positive_interest" => Self::PositiveInterest,
            "question" => Self::Question,
            "objection" => Self::Objection,
            "referral" => Self::Referral,
            "unsubscribe" => Self::Unsubscribe,
            "not_interested" => Self::NotInterested,
            "out_of_office" => Self::OutOfOffice,
            "bounce" => Self::Bounce,
            "unclear" => Self::Unclear,
            _ => return None,
        };
        Some(intent)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Complex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
}

/// Classifier output for one reply. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Classifier confidence in `intent`, 0.0–1.0.
    pub intent_confidence: f64,
    /// -1.0 (hostile) to 1.0 (enthusiastic).
    pub sentiment: f64,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub urgency: Urgency,
    /// Free-form reply type, used as the template filter key.
    pub reply_type: String,
}

// ── Knowledge base match ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KbMatchKind {
    Template,
    Handler,
}

/// The single best knowledge-base document for a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbMatch {
    #[serde(rename = "type")]
    pub kind: KbMatchKind,
    pub id: String,
    /// Similarity score after any fallback penalty, 0.0–1.0.
    pub confidence: f64,
    /// Template body or handler response, may contain `{{variable}}` placeholders.
    pub content: String,
    /// Handling strategy (handlers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Personalization guidance (templates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_actions: Vec<String>,
}

// ── Lead context ────────────────────────────────────────────────────

/// Caller-supplied lead information. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadContext {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub deal_value: Option<f64>,
    /// 0–100.
    pub lead_score: Option<f64>,
}

// ── Tier routing ────────────────────────────────────────────────────

/// Handling tier for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    /// Send automatically.
    AutoRespond = 1,
    /// Draft, post for human approval.
    Draft = 2,
    /// Full human escalation.
    Escalate = 3,
}

impl Tier {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AutoRespond => "auto_respond",
            Self::Draft => "draft",
            Self::Escalate => "escalate",
        }
    }

    /// The factor direction that agrees with this tier.
    pub fn direction(self) -> FactorDirection {
        match self {
            Self::AutoRespond => FactorDirection::Tier1,
            Self::Draft => FactorDirection::Tier2,
            Self::Escalate => FactorDirection::Tier3,
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::AutoRespond),
            2 => Ok(Self::Draft),
            3 => Ok(Self::Escalate),
            other => Err(format!("invalid tier {other}, expected 1, 2 or 3")),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

/// Which tier a routing factor pushes toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorDirection {
    #[serde(rename = "tier_1")]
    Tier1,
    #[serde(rename = "tier_2")]
    Tier2,
    #[serde(rename = "tier_3")]
    Tier3,
    #[serde(rename = "neutral")]
    Neutral,
}

/// One signal recorded while routing, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingFactor {
    pub factor: String,
    pub value: serde_json::Value,
    pub weight: f64,
    pub direction: FactorDirection,
}

impl RoutingFactor {
    pub fn new(
        factor: impl Into<String>,
        value: impl Into<serde_json::Value>,
        weight: f64,
        direction: FactorDirection,
    ) -> Self {
        Self {
            factor: factor.into(),
            value: value.into(),
            weight,
            direction,
        }
    }
}

/// Router decision for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRouting {
    pub tier: Tier,
    pub reason: String,
    pub factors: Vec<RoutingFactor>,
    pub override_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    pub routed_at: DateTime<Utc>,
}
