//! Reply triage: clean inbound campaign replies, match them against a
//! tenant knowledge base and route each to a handling tier.

pub mod config;
pub mod email;
pub mod error;
pub mod kb;
pub mod pipeline;
