//! Reply triage pipeline.
//!
//! Every reply flows through:
//! 1. `email::parse_email_reply()`: strip quotes, forwards and signatures
//! 2. `ReplyClassifier::classify()`: intent, sentiment, complexity
//! 3. `KbMatcher::find_match()`: best template or objection handler
//! 4. `TierRouter::route()`: tier 1 (auto), 2 (draft) or 3 (escalate)

pub mod router;
pub mod triage;
pub mod types;

pub use router::{RoutingInput, TierRouter, calculate_routing_confidence};
pub use triage::{ReplyClassifier, StaticClassifier, TriageOutcome, TriagePipeline, TriageRequest};
