//! Auto-reply detection and quoted-sender extraction.

use serde::{Deserialize, Serialize};

use crate::email::patterns::{ANGLE_ADDRESS, BARE_ADDRESS, FROM_LINE, WROTE_LINE};

/// Kind of machine-generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoReplyKind {
    OutOfOffice,
    Bounce,
    Automated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReplyDetection {
    pub is_auto_reply: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AutoReplyKind>,
}

impl AutoReplyDetection {
    fn none() -> Self {
        Self {
            is_auto_reply: false,
            kind: None,
        }
    }

    fn of(kind: AutoReplyKind) -> Self {
        Self {
            is_auto_reply: true,
            kind: Some(kind),
        }
    }
}

const OUT_OF_OFFICE_KEYWORDS: &[&str] = &[
    "out of office",
    "out of the office",
    "on vacation",
    "on holiday",
    "on annual leave",
    "on parental leave",
    "on maternity leave",
    "on paternity leave",
    "away from the office",
    "limited access to email",
    "limited access to my email",
    "i am currently away",
    "i'm currently away",
    "will be back on",
    "i will return on",
];

const BOUNCE_KEYWORDS: &[&str] = &[
    "delivery status notification",
    "delivery has failed",
    "delivery failed",
    "undeliverable",
    "mail delivery subsystem",
    "address not found",
    "mailbox unavailable",
    "mailbox not found",
    "message not delivered",
    "could not be delivered",
    "recipient address rejected",
    "user unknown",
    "returned mail",
];

const AUTOMATED_KEYWORDS: &[&str] = &[
    "automatic reply",
    "auto-reply",
    "autoreply",
    "auto reply",
    "this is an automated",
    "this is an automatic",
    "do not reply to this",
    "this mailbox is not monitored",
    "your ticket has been",
    "we have received your request",
];

/// Classify cleaned content as an auto-reply by keyword family.
///
/// Families are checked out-of-office, bounce, automated; first hit wins.
pub fn detect_auto_reply(text: &str) -> AutoReplyDetection {
    let lower = text.to_lowercase();
    let families = [
        (AutoReplyKind::OutOfOffice, OUT_OF_OFFICE_KEYWORDS),
        (AutoReplyKind::Bounce, BOUNCE_KEYWORDS),
        (AutoReplyKind::Automated, AUTOMATED_KEYWORDS),
    ];

    families
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(kind, _)| AutoReplyDetection::of(*kind))
        .unwrap_or_else(AutoReplyDetection::none)
}

/// Best-effort sender of the quoted message.
///
/// Tries the "On … wrote:" attribution, then a `From:` header line, then
/// any `<address>` in the text.
pub fn extract_sender_from_quote(text: &str) -> Option<String> {
    if let Some(caps) = WROTE_LINE.captures(text) {
        let attribution = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if let Some(addr) = ANGLE_ADDRESS.captures(attribution) {
            return Some(addr[1].to_string());
        }
        if let Some(name) = name_from_attribution(attribution) {
            return Some(name);
        }
    }

    if let Some(caps) = FROM_LINE.captures(text) {
        let value = caps[1].trim();
        if let Some(addr) = ANGLE_ADDRESS.captures(value) {
            return Some(addr[1].to_string());
        }
        if let Some(addr) = BARE_ADDRESS.find(value) {
            return Some(addr.as_str().to_string());
        }
        let name = value.trim_matches(|c: char| c == '"' || c == '*').trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    ANGLE_ADDRESS.captures(text).map(|c| c[1].to_string())
}

/// The name at the end of a "On <date>[,] <name>" attribution.
fn name_from_attribution(attribution: &str) -> Option<String> {
    let flat = attribution.replace('\n', " ");
    let flat = flat.trim();

    let tail = [" AM ", " PM ", " am ", " pm "]
        .iter()
        .filter_map(|marker| flat.rfind(marker).map(|i| &flat[i + marker.len()..]))
        .min_by_key(|t| t.len())
        .or_else(|| flat.rfind(',').map(|i| &flat[i + 1..]))
        .unwrap_or(flat);

    // Drop any leading date tokens ("2026-01-05 Alice").
    let name = tail
        .split_whitespace()
        .skip_while(|w| w.chars().any(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ");

    (!name.is_empty()).then_some(name)
}
