//! Coarse message-type classification.
//!
//! Exported transcripts mark attachments and group notices with a
//! left-to-right mark (U+200E) followed by a fixed phrase. Older exports use
//! angle-bracket placeholders instead, so both spellings are accepted.

use crate::models::MessageType;

/// Left-to-right mark the exporter places in front of generated text.
pub const STRUCTURAL_MARKER: char = '\u{200E}';

/// Poll marker token
pub const POLL_MARKER: &str = "POLL:";

const ADMIN_PHRASES: [&str; 7] = [
    "pinned a message",
    "added",
    "removed",
    "changed",
    "created group",
    "left",
    "joined",
];

const MEDIA_MARKERS: [(MessageType, &str, &str); 4] = [
    (MessageType::Image, "\u{200E}image omitted", "<image omitted>"),
    (MessageType::Video, "\u{200E}video omitted", "<video omitted>"),
    (MessageType::Sticker, "\u{200E}sticker omitted", "<sticker omitted>"),
    (MessageType::Audio, "\u{200E}audio omitted", "<audio omitted>"),
];

/// Assign a coarse type to a message body.
///
/// First match wins: system notice, then media placeholder, then poll,
/// otherwise text.
#[must_use]
pub fn classify(body: &str) -> MessageType {
    if is_system_notice(body) {
        return MessageType::System;
    }

    for (kind, current, legacy) in MEDIA_MARKERS {
        if body.contains(current) || body.contains(legacy) {
            return kind;
        }
    }

    if body.contains(POLL_MARKER) {
        return MessageType::Poll;
    }

    MessageType::Text
}

fn is_system_notice(body: &str) -> bool {
    if !body.contains(STRUCTURAL_MARKER) {
        return false;
    }
    let lower = body.to_lowercase();
    ADMIN_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
