//! Static pattern tables for reply extraction.
//!
//! Order matters only where noted; every table is compiled once on first use.

use std::sync::LazyLock;

use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid static pattern {p:?}: {e}")))
        .collect()
}

/// Confidentiality paragraphs, removed up to the next blank line.
pub static DISCLAIMER_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:^|\n)[ \t]*(?:CONFIDENTIALITY NOTICE|DISCLAIMER|PRIVILEGED AND CONFIDENTIAL)[ \t]*:.*?(?:\n[ \t]*\n|\z)",
    )
    .unwrap_or_else(|e| panic!("{e}"))
});

/// Footer lines removed wherever they appear, newline included.
pub static BOILERPLATE_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)^[^\n]*\bthis (?:e-?mail|message)(?: and any attachments?)? (?:is|are|may contain|contains?) (?:confidential|privileged|intended (?:solely|only))[^\n]*\n?",
        // Unsubscribe footers (a lead asking to unsubscribe is not a footer)
        r"(?im)^[^\n]*\bclick here to unsubscribe\b[^\n]*\n?",
        r"(?im)^[^\n]*\bto unsubscribe\b[^\n]*\b(?:click|visit|follow|use)\b[^\n]*\n?",
        r"(?im)^[^\n]*\bunsubscribe from (?:these|this|our|all) (?:e-?mails?|list|mailings?|messages?)\b[^\n]*\n?",
        r"(?im)^[^\n]*\bmanage (?:your )?(?:e-?mail |subscription |notification )?preferences\b[^\n]*\n?",
        r"(?im)^[^\n]*\bthis e-?mail was sent (?:to|by)\b[^\n]*\n?",
        // Printer and antivirus stamps
        r"(?im)^[^\n]*\bconsider the environment before printing\b[^\n]*\n?",
        r"(?im)^[^\n]*\bthis e-?mail has been (?:checked|scanned) for viruses\b[^\n]*\n?",
    ])
});

/// `boundary=` declaration of a multipart body.
pub static MIME_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)boundary="?([^";\s]+)"?"#).unwrap_or_else(|e| panic!("{e}"))
});

/// Reply headers written by mail clients above quoted text.
pub static REPLY_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // Gmail / Apple Mail, possibly wrapped onto a second line
        r"(?m)^[ \t]*On [^\n]{1,200}(?:\n[^\n]{1,200})?\bwrote:[ \t]*$",
        // Localized variants
        r"(?m)^[ \t]*Le [^\n]{1,200}a écrit[ \t]*:",
        r"(?m)^[ \t]*Am [^\n]{1,200}schrieb[^\n]*:",
        r"(?m)^[ \t]*El [^\n]{1,200}escribió[ \t]*:",
        // Outlook
        r"(?im)^[ \t]*-{2,}[ \t]*Original Message[ \t]*-{2,}",
        r"(?m)^[ \t]*_{20,}[ \t]*\n[ \t]*\*?From:",
        r"(?m)^[ \t]*\*?From:\*?[ \t][^\n]+\n(?:[ \t]*\*?(?:To|Cc|Reply-To):\*?[^\n]*\n)?[ \t]*\*?(?:Sent|Date):",
        // Two or more consecutive quoted lines
        r"(?m)^[ \t]*[>|][^\n]*\n[ \t]*[>|]",
    ])
});

/// Forwarded-message separators.
pub static FORWARD_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)^[ \t]*-{3,}[ \t]*Forwarded message[ \t]*-{3,}",
        r"(?im)^[ \t]*Begin forwarded message[ \t]*:",
        r"(?im)^[ \t]*-{3,}[ \t]*Forwarded by\b",
        r"(?im)^[ \t]*-{3,}[ \t]*Weitergeleitete Nachricht[ \t]*-{3,}",
    ])
});

/// Whole-line signature starters (matched against the trimmed line).
pub static SIGNATURE_STARTERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^--[ \t]*$",
        r"^__+[ \t]*$",
        r"(?i)^(?:best|kind|warm|warmest|with)?[ \t]*regards[,.!]?$",
        r"(?i)^best(?: wishes)?[,.!]?$",
        r"(?i)^all the best[,.!]?$",
        r"(?i)^(?:many )?thanks(?: again| so much| in advance)?[,.!]?$",
        r"(?i)^thank you(?: so much)?[,.!]?$",
        r"(?i)^(?:thx|tks|ty)[,.!]?$",
        r"(?i)^cheers[,.!]?$",
        r"(?i)^sincerely(?: yours)?[,.]?$",
        r"(?i)^yours (?:truly|sincerely)[,.]?$",
        r"(?i)^(?:talk soon|take care|speak soon)[,.!]?$",
        r"(?i)^sent from my [^\n]+$",
        r"(?i)^sent from (?:yahoo mail|mail for windows|outlook)[^\n]*$",
        r"(?i)^get outlook for [^\n]+$",
    ])
});

/// Three or more blank lines (after per-line trimming).
pub static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{4,}").unwrap_or_else(|e| panic!("{e}")));

// ── Sender extraction ───────────────────────────────────────────────

pub static WROTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*On ([^\n]{1,200}(?:\n[^\n]{1,200})?)\bwrote:")
        .unwrap_or_else(|e| panic!("{e}"))
});

pub static FROM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t>]*\*?From:\*?[ \t]*([^\n]+)$").unwrap_or_else(|e| panic!("{e}"))
});

pub static ANGLE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})>")
        .unwrap_or_else(|e| panic!("{e}"))
});

pub static BARE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap_or_else(|e| panic!("{e}"))
});
