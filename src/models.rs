//! Data models for transcript messages, members and engagement metrics
//!
//! This module contains the structures that flow between the pipeline
//! stages, plus the row shapes written to the message and metrics stores.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used for every persisted date-time (ISO-8601, no offset).
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coarse classification of a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Ordinary text
    Text,
    /// Omitted image attachment
    Image,
    /// Omitted video attachment
    Video,
    /// Omitted sticker
    Sticker,
    /// Omitted voice note or audio file
    Audio,
    /// Poll with options
    Poll,
    /// Group administration notice
    System,
}

impl MessageType {
    /// Lower-case name as stored in the message table
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Sticker => "sticker",
            Self::Audio => "audio",
            Self::Poll => "poll",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical transcript entry, possibly spanning several lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// Local wall-clock time of the entry, second precision
    pub timestamp: NaiveDateTime,
    /// Sender label exactly as it appears in the transcript
    pub sender_name: String,
    /// Message body; continuation lines are joined with `\n`
    pub message_content: String,
    /// Coarse type assigned when the message is flushed
    pub message_type: MessageType,
    /// True when the body carries a poll marker
    pub is_poll: bool,
    /// Poll options in transcript order, present only for polls
    pub poll_options: Option<Vec<String>>,
    /// True when the body carries the edited marker
    pub is_edited: bool,
    /// Original transcript slice, including continuation lines
    pub raw_line: String,
}

/// A known community member, read from the member directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDirectoryEntry {
    /// Stable member identifier
    pub id: String,
    /// Member's full name as registered
    pub full_name: String,
    /// Member's phone number (optional)
    pub phone_number: Option<String>,
}

/// Data for creating or updating a directory member
#[derive(Debug, Clone)]
pub struct NewMember {
    /// Stable member identifier
    pub id: String,
    /// Member's full name
    pub full_name: String,
    /// Member's phone number
    pub phone_number: Option<String>,
}

/// Resolution of every distinct sender name seen in a run.
///
/// Holds exactly one entry per distinct name, in the order the names were
/// first offered to the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderMatches {
    order: Vec<String>,
    resolved: BTreeMap<String, Option<String>>,
}

impl SenderMatches {
    /// Record the outcome for a sender. Later inserts for the same name are ignored.
    pub fn insert(&mut self, sender_name: &str, member_id: Option<String>) {
        if self.resolved.contains_key(sender_name) {
            return;
        }
        self.order.push(sender_name.to_string());
        self.resolved.insert(sender_name.to_string(), member_id);
    }

    /// Member id for a sender, `None` when unresolved or unknown
    #[must_use]
    pub fn member_for(&self, sender_name: &str) -> Option<&str> {
        self.resolved.get(sender_name).and_then(Option::as_deref)
    }

    /// True when the sender was offered to the matcher
    #[must_use]
    pub fn contains(&self, sender_name: &str) -> bool {
        self.resolved.contains_key(sender_name)
    }

    /// Number of distinct sender names
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no sender names were offered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sender names that resolved to a member, in first-seen order
    #[must_use]
    pub fn matched(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.member_for(name).is_some())
            .map(String::as_str)
            .collect()
    }

    /// Sender names that stayed unresolved, in first-seen order
    #[must_use]
    pub fn unmatched(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.member_for(name).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Iterate `(sender_name, member_id)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.member_for(name)))
    }
}

/// Activity tier derived from the engagement score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorType {
    /// Score 80 and above
    Champion,
    /// Score 60 to 79
    Contributing,
    /// Score 40 to 59
    Curious,
    /// Score 20 to 39
    Encouraging,
    /// Below 20
    Quiet,
}

impl BehaviorType {
    /// Tier for a score, checked highest first
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::Champion
        } else if score >= 60 {
            Self::Contributing
        } else if score >= 40 {
            Self::Curious
        } else if score >= 20 {
            Self::Encouraging
        } else {
            Self::Quiet
        }
    }

    /// Lower-case name as stored in the metrics table
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Champion => "champion",
            Self::Contributing => "contributing",
            Self::Curious => "curious",
            Self::Encouraging => "encouraging",
            Self::Quiet => "quiet",
        }
    }

    /// Parse a stored behavior name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "champion" => Some(Self::Champion),
            "contributing" => Some(Self::Contributing),
            "curious" => Some(Self::Curious),
            "encouraging" => Some(Self::Encouraging),
            "quiet" => Some(Self::Quiet),
            _ => None,
        }
    }
}

impl fmt::Display for BehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-member engagement snapshot for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Member the metrics belong to
    pub member_id: String,
    /// Matched messages in the scored set
    pub total_messages: u32,
    /// Messages since the first day of the current month
    pub messages_this_month: u32,
    /// Messages within the previous calendar month
    pub messages_last_month: u32,
    /// Bounded score in `0..=100`
    pub engagement_score: u8,
    /// Tier derived from the score
    pub behavior_type: BehaviorType,
    /// Earliest matched message
    pub first_message_at: NaiveDateTime,
    /// Latest matched message
    pub last_message_at: NaiveDateTime,
}

/// Row written to the message store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Resolved member, `None` for unresolved senders
    pub member_id: Option<String>,
    /// Raw sender label
    pub sender_name: String,
    /// Message body
    pub message_content: String,
    /// Coarse message type
    pub message_type: MessageType,
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// True when `member_id` is set
    pub is_matched: bool,
    /// Original transcript slice
    pub raw_line: String,
}

impl MessageRecord {
    /// Build a store row for a parsed message and its resolution
    #[must_use]
    pub fn from_parsed(message: &ParsedMessage, member_id: Option<&str>) -> Self {
        Self {
            member_id: member_id.map(ToString::to_string),
            sender_name: message.sender_name.clone(),
            message_content: message.message_content.clone(),
            message_type: message.message_type,
            timestamp: message.timestamp.format(ISO_FORMAT).to_string(),
            is_matched: member_id.is_some(),
            raw_line: message.raw_line.clone(),
        }
    }
}

/// Row upserted into the engagement metrics store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Computed metrics
    pub metrics: EngagementMetrics,
    /// When the metrics were computed
    pub last_calculated_at: NaiveDateTime,
}

/// How many members landed in each behavior tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorDistribution {
    /// Members scored as champions
    pub champion: usize,
    /// Members scored as contributing
    pub contributing: usize,
    /// Members scored as curious
    pub curious: usize,
    /// Members scored as encouraging
    pub encouraging: usize,
    /// Members scored as quiet
    pub quiet: usize,
}

impl BehaviorDistribution {
    /// Count one member in its tier
    pub fn record(&mut self, behavior: BehaviorType) {
        match behavior {
            BehaviorType::Champion => self.champion += 1,
            BehaviorType::Contributing => self.contributing += 1,
            BehaviorType::Curious => self.curious += 1,
            BehaviorType::Encouraging => self.encouraging += 1,
            BehaviorType::Quiet => self.quiet += 1,
        }
    }

    /// Total members counted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.champion + self.contributing + self.curious + self.encouraging + self.quiet
    }
}
