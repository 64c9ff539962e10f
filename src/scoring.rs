//! Engagement scoring.
//!
//! A member's score blends their share of all matched messages with how
//! recently they last wrote:
//!
//! ```text
//! percentage = member_messages / all_matched_messages * 100
//! score      = min(100, round(percentage * 10 * recency_multiplier))
//! ```
//!
//! The recency thresholds (7/30/90 days) and the factor of ten are
//! empirical and kept as-is so scores stay comparable across runs.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{
    BehaviorDistribution, BehaviorType, EngagementMetrics, ParsedMessage, SenderMatches,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Matched message timestamps grouped by member id, in timeline order
pub type MemberTimeline = BTreeMap<String, Vec<NaiveDateTime>>;

/// Computes engagement metrics relative to a fixed "now"
#[derive(Debug, Clone, Copy)]
pub struct EngagementScorer {
    now: NaiveDateTime,
    this_month_start: NaiveDateTime,
    last_month_start: NaiveDateTime,
}

impl EngagementScorer {
    /// Scorer anchored at `now` (local wall-clock time)
    #[must_use]
    pub fn new(now: NaiveDateTime) -> Self {
        let this_month = first_of_month(now.date());
        let last_month = first_of_month(this_month - Duration::days(1));
        Self {
            now,
            this_month_start: this_month.and_time(NaiveTime::MIN),
            last_month_start: last_month.and_time(NaiveTime::MIN),
        }
    }

    /// Instant the scorer measures recency against
    #[must_use]
    pub const fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Score every member with at least one message.
    ///
    /// Percentages are taken over all timestamps in `timeline`, so the map
    /// must hold the complete matched set for the run.
    #[must_use]
    pub fn score(&self, timeline: &MemberTimeline) -> BTreeMap<String, EngagementMetrics> {
        let total_matched: usize = timeline.values().map(Vec::len).sum();
        let mut results = BTreeMap::new();

        for (member_id, timestamps) in timeline {
            let (Some(&first), Some(&last)) = (timestamps.iter().min(), timestamps.iter().max())
            else {
                continue;
            };

            let messages_this_month = timestamps
                .iter()
                .filter(|ts| **ts >= self.this_month_start)
                .count();
            let messages_last_month = timestamps
                .iter()
                .filter(|ts| **ts >= self.last_month_start && **ts < self.this_month_start)
                .count();

            let engagement_score = self.engagement_score(timestamps.len(), total_matched, last);

            results.insert(
                member_id.clone(),
                EngagementMetrics {
                    member_id: member_id.clone(),
                    total_messages: saturating_u32(timestamps.len()),
                    messages_this_month: saturating_u32(messages_this_month),
                    messages_last_month: saturating_u32(messages_last_month),
                    engagement_score,
                    behavior_type: BehaviorType::from_score(engagement_score),
                    first_message_at: first,
                    last_message_at: last,
                },
            );
        }

        results
    }

    /// Bounded score for one member
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn engagement_score(
        &self,
        member_messages: usize,
        total_matched: usize,
        last_message_at: NaiveDateTime,
    ) -> u8 {
        if total_matched == 0 || member_messages == 0 {
            return 0;
        }
        let percentage = member_messages as f64 / total_matched as f64 * 100.0;
        let days_since_last = (self.now - last_message_at).num_seconds() as f64 / SECONDS_PER_DAY;
        let raw = (percentage * 10.0 * recency_multiplier(days_since_last)).round();
        raw.clamp(0.0, 100.0) as u8
    }
}

/// Weight applied to the message share based on days since the last message
#[must_use]
pub fn recency_multiplier(days_since_last: f64) -> f64 {
    if days_since_last <= 7.0 {
        1.0
    } else if days_since_last <= 30.0 {
        0.8
    } else if days_since_last <= 90.0 {
        0.5
    } else {
        0.1
    }
}

/// Group resolved messages by member; unresolved senders are left out
#[must_use]
pub fn group_by_member(messages: &[ParsedMessage], matches: &SenderMatches) -> MemberTimeline {
    let mut timeline = MemberTimeline::new();
    for message in messages {
        if let Some(member_id) = matches.member_for(&message.sender_name) {
            timeline
                .entry(member_id.to_string())
                .or_default()
                .push(message.timestamp);
        }
    }
    timeline
}

/// Count scored members per behavior tier
#[must_use]
pub fn distribution<'a, I>(metrics: I) -> BehaviorDistribution
where
    I: IntoIterator<Item = &'a EngagementMetrics>,
{
    let mut dist = BehaviorDistribution::default();
    for entry in metrics {
        dist.record(entry.behavior_type);
    }
    dist
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
