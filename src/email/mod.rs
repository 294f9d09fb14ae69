//! Email reply processing: isolate new content, detect auto-replies.

pub mod auto_reply;
pub mod extractor;
pub mod message;
mod patterns;

pub use auto_reply::{AutoReplyDetection, AutoReplyKind, detect_auto_reply, extract_sender_from_quote};
pub use extractor::{ParseOptions, ParsedEmail, extract_new_content, parse_email_reply};
pub use message::{InboundEmail, looks_like_message};
