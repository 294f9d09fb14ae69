//! Reply extraction: isolate the new, human-written part of an email.
//!
//! Pure string processing, no I/O. Each stage works on what the previous
//! stage left behind:
//! 1. boilerplate / disclaimer / unsubscribe footers
//! 2. first `text/plain` part of a multipart body
//! 3. quoted reply text (client reply headers + `>` blocks)
//! 4. forwarded messages
//! 5. signature (bottom-up scan)
//! 6. whitespace normalization
//! 7. optional line cap

use serde::{Deserialize, Serialize};

use crate::email::patterns::{
    BOILERPLATE_LINES, DISCLAIMER_PARAGRAPH, EXCESS_BLANK_LINES, FORWARD_MARKERS,
    MIME_BOUNDARY, REPLY_HEADERS, SIGNATURE_STARTERS,
};

/// Lines scanned upward from the bottom before giving up on a signature.
const SIGNATURE_SCAN_LIMIT: usize = 10;

/// Options for [`parse_email_reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Remove the trailing signature block.
    pub strip_signature: bool,
    /// Keep at most this many lines of the result.
    pub max_lines: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strip_signature: true,
            max_lines: None,
        }
    }
}

/// Result of extracting the new content from a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub new_content: String,
    pub had_quotes: bool,
    pub had_signature: bool,
    pub had_forward: bool,
    pub had_boilerplate: bool,
    /// Characters in the raw input.
    pub original_length: usize,
    /// Characters in `new_content`.
    pub parsed_length: usize,
    /// `parsed_length / original_length`; 1.0 for empty input.
    pub compression_ratio: f64,
}

/// Return only the new content of a raw reply, with default options.
pub fn extract_new_content(raw: &str) -> String {
    parse_email_reply(raw, &ParseOptions::default()).new_content
}

/// Extract the new content of a raw reply and report what was removed.
///
/// Never fails: empty or whitespace-only input yields empty content.
pub fn parse_email_reply(raw: &str, options: &ParseOptions) -> ParsedEmail {
    let original_length = raw.chars().count();

    if raw.trim().is_empty() {
        return ParsedEmail {
            new_content: String::new(),
            had_quotes: false,
            had_signature: false,
            had_forward: false,
            had_boilerplate: false,
            original_length,
            parsed_length: 0,
            compression_ratio: if original_length == 0 { 1.0 } else { 0.0 },
        };
    }

    let text = unify_line_endings(raw);
    let (text, had_boilerplate) = strip_boilerplate(&text);
    let text = extract_plain_text_part(&text).unwrap_or(text);
    let (text, had_quotes) = strip_quotes(&text);
    let (text, had_forward) = truncate_at_earliest(&text, &FORWARD_MARKERS);
    let (text, had_signature) = if options.strip_signature {
        strip_signature(&text)
    } else {
        (text, false)
    };
    let mut new_content = normalize_whitespace(&text);
    if let Some(max) = options.max_lines {
        new_content = cap_lines(&new_content, max);
    }

    let parsed_length = new_content.chars().count();
    ParsedEmail {
        new_content,
        had_quotes,
        had_signature,
        had_forward,
        had_boilerplate,
        original_length,
        parsed_length,
        compression_ratio: parsed_length as f64 / original_length as f64,
    }
}

// ── Stages ──────────────────────────────────────────────────────────

fn unify_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_boilerplate(text: &str) -> (String, bool) {
    let mut removed = DISCLAIMER_PARAGRAPH.is_match(text);
    let mut result = DISCLAIMER_PARAGRAPH.replace_all(text, "\n").into_owned();
    for pattern in BOILERPLATE_LINES.iter() {
        if pattern.is_match(&result) {
            removed = true;
            result = pattern.replace_all(&result, "").into_owned();
        }
    }
    (result, removed)
}

/// First `text/plain` part of a multipart body, if the body is multipart.
fn extract_plain_text_part(text: &str) -> Option<String> {
    let boundary = MIME_BOUNDARY.captures(text)?.get(1)?.as_str();
    let delimiter = format!("--{boundary}");

    for part in text.split(delimiter.as_str()).skip(1) {
        let Some((headers, body)) = part.split_once("\n\n") else {
            continue;
        };
        let is_plain = headers
            .lines()
            .any(|l| l.to_ascii_lowercase().starts_with("content-type: text/plain"));
        if is_plain {
            return Some(body.to_string());
        }
    }
    None
}

/// Cut at the earliest reply header or quote block, then drop any stray
/// `>`-quoted lines left above the cut.
fn strip_quotes(text: &str) -> (String, bool) {
    let pattern_cut = earliest_match(text, &REPLY_HEADERS);
    let block_cut = first_quote_block(text);
    let cut = match (pattern_cut, block_cut) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    let head = match cut {
        Some(offset) => &text[..offset],
        None => text,
    };

    let mut stripped_lines = false;
    let kept: Vec<&str> = head
        .lines()
        .filter(|line| {
            let quoted = line.trim_start().starts_with('>');
            stripped_lines |= quoted;
            !quoted
        })
        .collect();

    (kept.join("\n"), cut.is_some() || stripped_lines)
}

/// `>` or `|` prefixed. Both count toward a quote block; only `>` lines
/// are stripped on their own.
fn is_quote_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('>') || trimmed.starts_with('|')
}

/// Byte offset of the first run of two or more consecutive quote lines.
///
/// Offsets are computed from the lines themselves, so wrapped or
/// wide lines locate the block exactly.
fn first_quote_block(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut run_start: Option<usize> = None;
    let mut run_len = 0;

    for line in text.split('\n') {
        if is_quote_line(line) {
            if run_start.is_none() {
                run_start = Some(offset);
            }
            run_len += 1;
            if run_len >= 2 {
                return run_start;
            }
        } else {
            run_start = None;
            run_len = 0;
        }
        offset += line.len() + 1;
    }
    None
}

fn earliest_match(text: &str, patterns: &[regex::Regex]) -> Option<usize> {
    patterns
        .iter()
        .filter_map(|p| p.find(text).map(|m| m.start()))
        .min()
}

fn truncate_at_earliest(text: &str, patterns: &[regex::Regex]) -> (String, bool) {
    match earliest_match(text, patterns) {
        Some(offset) => (text[..offset].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Scan upward from the last non-blank line for a signature starter.
///
/// A starter on the first content line is not treated as a signature,
/// so a bare "Thanks!" reply survives.
fn strip_signature(text: &str) -> (String, bool) {
    let lines: Vec<&str> = text.lines().collect();
    let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) else {
        return (text.to_string(), false);
    };
    let first_content = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(0);

    let mut scanned = 0;
    for idx in (0..=last).rev() {
        let trimmed = lines[idx].trim();
        if SIGNATURE_STARTERS.iter().any(|r| r.is_match(trimmed)) {
            if idx <= first_content {
                break;
            }
            return (lines[..idx].join("\n"), true);
        }
        scanned += 1;
        if scanned >= SIGNATURE_SCAN_LIMIT {
            break;
        }
    }
    (text.to_string(), false)
}

fn normalize_whitespace(text: &str) -> String {
    let trimmed_lines = unify_line_endings(text)
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

fn cap_lines(text: &str, max: usize) -> String {
    text.lines()
        .take(max)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
