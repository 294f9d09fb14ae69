//! Raw RFC 822 message ingestion via `mail-parser`.
//!
//! Turns a full message (headers + MIME body) into the sender, subject and
//! readable body that the extractor works on.

use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::email::extractor::{ParseOptions, ParsedEmail, parse_email_reply};

/// A parsed inbound reply, before extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    /// Sender address.
    pub from: Option<String>,
    /// Sender display name.
    pub from_name: Option<String>,
    pub subject: Option<String>,
    /// Readable body: the plain-text part, else the HTML part stripped of tags.
    pub body: String,
}

impl InboundEmail {
    /// Parse raw message bytes. Returns `None` if nothing parseable is found.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let parsed = MessageParser::default().parse(raw)?;

        let sender = parsed.from().and_then(|addr| addr.first());
        let from = sender.and_then(|a| a.address()).map(str::to_string);
        let from_name = sender.and_then(|a| a.name()).map(str::to_string);

        Some(Self {
            message_id: parsed.message_id().map(str::to_string),
            in_reply_to: parsed.in_reply_to().as_text().map(str::to_string),
            from,
            from_name,
            subject: parsed.subject().map(str::to_string),
            body: readable_body(&parsed),
        })
    }

    /// Run the extractor over the body.
    pub fn extract(&self, options: &ParseOptions) -> ParsedEmail {
        parse_email_reply(&self.body, options)
    }

    /// Whether this looks like a reply to an earlier message.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to.is_some()
            || self
                .subject
                .as_deref()
                .is_some_and(|s| s.trim_start().to_ascii_lowercase().starts_with("re:"))
    }
}

/// Header names that mark the start of a full message rather than a bare body.
const LEADING_HEADERS: &[&str] = &[
    "from",
    "to",
    "subject",
    "received",
    "return-path",
    "delivered-to",
    "date",
    "message-id",
    "mime-version",
];

/// Whether raw input starts with a known RFC 822 header line.
///
/// A bare body such as "Note: I'm interested" is not a message.
pub fn looks_like_message(raw: &[u8]) -> bool {
    let first_line = raw.split(|b| *b == b'\n').next().unwrap_or_default();
    let Some(colon) = first_line.iter().position(|b| *b == b':') else {
        return false;
    };
    let Ok(name) = std::str::from_utf8(&first_line[..colon]) else {
        return false;
    };
    LEADING_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

fn readable_body(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.into_owned();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Strip HTML tags, keeping line structure from block-level tags.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if matches!(name.as_str(), "br" | "p" | "div" | "li" | "tr" | "blockquote") {
                    result.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => result.push(ch),
        }
    }

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN_REPLY: &str = "From: Jane Doe <jane@acme.io>\r\n\
To: rep@vendor.com\r\n\
Subject: Re: Quick intro\r\n\
Message-ID: <reply-1@acme.io>\r\n\
In-Reply-To: <pitch-1@vendor.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Sounds interesting, send me more info.\r\n\
\r\n\
On Mon, Jan 5, 2026 at 10:00 AM Rep <rep@vendor.com> wrote:\r\n\
> Hi Jane\r\n\
> Quick intro\r\n";

    #[test]
    fn detects_full_messages_by_header_name() {
        assert!(looks_like_message(PLAIN_REPLY.as_bytes()));
        assert!(looks_like_message(b"Received: from mx.acme.io\r\nFrom: a@b.c\r\n\r\nHi"));
        assert!(looks_like_message(b"MIME-Version: 1.0\nSubject: x\n\nbody"));
    }

    #[test]
    fn bare_body_with_colon_is_not_a_message() {
        assert!(!looks_like_message(b"Note: I'm interested, call me Tuesday"));
        assert!(!looks_like_message(b"PS: pricing please"));
        assert!(!looks_like_message(b"Thanks for reaching out!"));
        assert!(!looks_like_message(b""));
    }

    #[test]
    fn parses_headers_and_body() {
        let email = InboundEmail::parse(PLAIN_REPLY.as_bytes()).unwrap();
        assert_eq!(email.from.as_deref(), Some("jane@acme.io"));
        assert_eq!(email.from_name.as_deref(), Some("Jane Doe"));
        assert_eq!(email.subject.as_deref(), Some("Re: Quick intro"));
        assert_eq!(email.message_id.as_deref(), Some("reply-1@acme.io"));
        assert!(email.is_reply());
        assert!(email.body.contains("send me more info"));
    }

    #[test]
    fn extract_strips_quoted_pitch() {
        let email = InboundEmail::parse(PLAIN_REPLY.as_bytes()).unwrap();
        let parsed = email.extract(&ParseOptions::default());
        assert_eq!(parsed.new_content, "Sounds interesting, send me more info.");
        assert!(parsed.had_quotes);
    }

    #[test]
    fn html_only_body_is_stripped() {
        let raw = "From: a@b.io\r\n\
Subject: Hello\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Yes &amp; please</p><p>call me</p></body></html>\r\n";
        let email = InboundEmail::parse(raw.as_bytes()).unwrap();
        assert!(!email.is_reply());
        let parsed = email.extract(&ParseOptions::default());
        assert!(parsed.new_content.contains("Yes & please"));
        assert!(parsed.new_content.contains("call me"));
    }

    // ── strip_html ──────────────────────────────────────────────────

    #[test]
    fn strip_html_keeps_paragraph_breaks() {
        assert_eq!(strip_html("<p>One</p><p>Two</p>"), "One\n\nTwo");
    }

    #[test]
    fn strip_html_with_attributes_and_entities() {
        assert_eq!(
            strip_html(r#"<a href="https://example.com">Fish &amp; chips</a>"#),
            "Fish & chips"
        );
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
        assert_eq!(strip_html(""), "");
    }
}
