//! Transcript parsing.
//!
//! Turns an exported chat transcript into [`ParsedMessage`] records with a
//! single forward scan. An entry line looks like
//!
//! ```text
//! [10/1/24, 5:49:57 PM] Keegan Arthur: message content
//! ```
//!
//! Any other non-blank line continues the entry before it. Messages are
//! returned in transcript order; nothing is re-sorted.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::debug;

use crate::classifier::{classify, POLL_MARKER};
use crate::error::{EngagementError, Result};
use crate::models::ParsedMessage;

/// Marker that opens a poll option line (current exports prefix it with U+200E)
const OPTION_MARKERS: [&str; 2] = ["\u{200E}OPTION:", "OPTION:"];

/// Marker appended by the exporter to edited messages
const EDITED_MARKER: &str = "<This message was edited>";

/// Line-oriented transcript parser
#[derive(Debug, Clone)]
pub struct TranscriptParser {
    entry_regex: Regex,
    time_regex: Regex,
}

impl TranscriptParser {
    /// Compile the entry and time patterns
    pub fn new() -> Result<Self> {
        // The time part is captured loosely so that a recognizable entry with a
        // broken clock value fails loudly instead of becoming a continuation.
        let entry_regex =
            Regex::new(r"^\[(\d{1,2}/\d{1,2}/\d{2,4}),\s+([^\]]+)\]\s+([^:]+):\s*(.*)$")?;
        let time_regex = Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})\s+(AM|PM)$")?;

        Ok(Self {
            entry_regex,
            time_regex,
        })
    }

    /// Parse a whole transcript into messages, in transcript order.
    ///
    /// Fails on the first entry whose date or time cannot be interpreted.
    pub fn parse(&self, text: &str) -> Result<Vec<ParsedMessage>> {
        let mut messages = Vec::new();
        let mut current: Option<PendingMessage> = None;
        let mut orphan_lines = 0usize;

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(caps) = self.entry_regex.captures(trimmed) {
                if let Some(pending) = current.take() {
                    messages.push(pending.finish());
                }

                let timestamp = self.parse_timestamp(&caps[1], &caps[2], index + 1)?;
                current = Some(PendingMessage::open(
                    timestamp,
                    caps[3].trim(),
                    caps[4].trim(),
                    trimmed,
                ));
            } else if let Some(pending) = current.as_mut() {
                pending.continue_with(trimmed);
            } else {
                orphan_lines += 1;
            }
        }

        if let Some(pending) = current.take() {
            messages.push(pending.finish());
        }

        if orphan_lines > 0 {
            debug!(orphan_lines, "Skipped lines before the first entry");
        }

        Ok(messages)
    }

    /// Combine `M/D/YY` (or `M/D/YYYY`) and `H:MM:SS AM|PM` into a local date-time
    fn parse_timestamp(&self, date: &str, time: &str, line: usize) -> Result<NaiveDateTime> {
        let invalid = || EngagementError::InvalidTimestamp {
            line,
            value: format!("{date}, {time}"),
        };

        let mut parts = date.split('/').map(str::parse::<u32>);
        let (Some(Ok(month)), Some(Ok(day)), Some(Ok(year)), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let year = if year < 100 { year + 2000 } else { year };
        let year = i32::try_from(year).map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

        let caps = self.time_regex.captures(time.trim()).ok_or_else(invalid)?;
        let hours: u32 = caps[1].parse().map_err(|_| invalid())?;
        let minutes: u32 = caps[2].parse().map_err(|_| invalid())?;
        let seconds: u32 = caps[3].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&hours) {
            return Err(invalid());
        }
        let hours = match (&caps[4], hours) {
            ("AM", 12) => 0,
            ("PM", 12) => 12,
            ("PM", h) => h + 12,
            (_, h) => h,
        };
        let time = NaiveTime::from_hms_opt(hours, minutes, seconds).ok_or_else(invalid)?;

        Ok(date.and_time(time))
    }
}

/// Message being accumulated while continuation lines are read
struct PendingMessage {
    timestamp: NaiveDateTime,
    sender_name: String,
    content: String,
    raw_line: String,
    poll_options: Option<Vec<String>>,
}

impl PendingMessage {
    fn open(timestamp: NaiveDateTime, sender: &str, body: &str, raw: &str) -> Self {
        let poll_options = body.contains(POLL_MARKER).then(Vec::new);
        Self {
            timestamp,
            sender_name: sender.to_string(),
            content: body.to_string(),
            raw_line: raw.to_string(),
            poll_options,
        }
    }

    fn continue_with(&mut self, line: &str) {
        if self.poll_options.is_none() && line.contains(POLL_MARKER) {
            self.poll_options = Some(Vec::new());
        }
        if let Some(options) = self.poll_options.as_mut() {
            if let Some(option) = OPTION_MARKERS
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
            {
                options.push(option.trim().to_string());
                return;
            }
        }
        self.content.push('\n');
        self.content.push_str(line);
        self.raw_line.push('\n');
        self.raw_line.push_str(line);
    }

    fn finish(self) -> ParsedMessage {
        ParsedMessage {
            timestamp: self.timestamp,
            message_type: classify(&self.content),
            is_edited: self.content.contains(EDITED_MARKER),
            is_poll: self.poll_options.is_some(),
            poll_options: self.poll_options,
            sender_name: self.sender_name,
            message_content: self.content,
            raw_line: self.raw_line,
        }
    }
}
