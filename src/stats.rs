//! Summary statistics over a parsed transcript.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{MessageType, ParsedMessage};

/// Counts gathered from one parsed transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    /// Number of messages
    pub total_messages: usize,
    /// Messages per type
    pub by_type: BTreeMap<MessageType, usize>,
    /// Messages per raw sender name
    pub by_sender: BTreeMap<String, usize>,
    /// Timestamp of the first message in timeline order
    pub first_timestamp: Option<NaiveDateTime>,
    /// Timestamp of the last message in timeline order
    pub last_timestamp: Option<NaiveDateTime>,
    /// Distinct sender names in first-seen order
    pub unique_senders: Vec<String>,
}

impl MessageStats {
    /// Gather statistics from messages in timeline order
    #[must_use]
    pub fn from_messages(messages: &[ParsedMessage]) -> Self {
        let mut stats = Self {
            total_messages: messages.len(),
            first_timestamp: messages.first().map(|m| m.timestamp),
            last_timestamp: messages.last().map(|m| m.timestamp),
            ..Self::default()
        };
        let mut seen = HashSet::new();

        for message in messages {
            *stats.by_type.entry(message.message_type).or_insert(0) += 1;
            *stats
                .by_sender
                .entry(message.sender_name.clone())
                .or_insert(0) += 1;
            if seen.insert(message.sender_name.as_str()) {
                stats.unique_senders.push(message.sender_name.clone());
            }
        }

        stats
    }

    /// Number of distinct sender names
    #[must_use]
    pub fn unique_sender_count(&self) -> usize {
        self.unique_senders.len()
    }
}
