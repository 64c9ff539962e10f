use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::models::BehaviorDistribution;

/// Metric names emitted by an import or recalculation run.
///
/// Only the `metrics` facade is used; installing an exporter is left to
/// the binary embedding the library.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    // Parsing
    /// Messages produced by the parser
    pub messages_parsed_total: &'static str,
    /// Time spent parsing one transcript
    pub parse_duration: &'static str,

    // Identity matching
    /// Distinct sender names resolved to a member
    pub senders_matched_total: &'static str,
    /// Distinct sender names with no member
    pub senders_unmatched_total: &'static str,

    // Storage
    /// Messages newly written to the message store
    pub messages_imported_total: &'static str,
    /// Storage batches, labelled by kind and outcome
    pub batches_total: &'static str,
    /// Time spent writing one batch
    pub batch_duration: &'static str,
    /// Metrics rows written
    pub metrics_upserted_total: &'static str,

    // Scoring
    /// Members per behavior type after the last scoring pass
    pub members_by_behavior: &'static str,
    /// Time spent in each pipeline stage
    pub stage_duration: &'static str,

    // Errors
    /// Failures, labelled by error type and operation
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            messages_parsed_total: "chat_engagement_messages_parsed_total",
            parse_duration: "chat_engagement_parse_duration_seconds",

            senders_matched_total: "chat_engagement_senders_matched_total",
            senders_unmatched_total: "chat_engagement_senders_unmatched_total",

            messages_imported_total: "chat_engagement_messages_imported_total",
            batches_total: "chat_engagement_batches_total",
            batch_duration: "chat_engagement_batch_duration_seconds",
            metrics_upserted_total: "chat_engagement_metrics_upserted_total",

            members_by_behavior: "chat_engagement_members_by_behavior",
            stage_duration: "chat_engagement_stage_duration_seconds",

            errors_total: "chat_engagement_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Record a completed transcript parse
    pub fn record_parse(&self, count: usize, duration: Duration) {
        counter!(self.messages_parsed_total).increment(count as u64);
        histogram!(self.parse_duration).record(duration.as_secs_f64());
    }

    /// Record identity resolution results
    pub fn record_matching(&self, matched: usize, unmatched: usize) {
        counter!(self.senders_matched_total).increment(matched as u64);
        counter!(self.senders_unmatched_total).increment(unmatched as u64);
    }

    /// Record one store write batch
    pub fn record_batch(&self, kind: &'static str, size: usize, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(self.batches_total, "kind" => kind, "status" => status).increment(1);
        histogram!(self.batch_duration, "kind" => kind).record(duration.as_secs_f64());

        if success {
            let name = match kind {
                "metrics" => self.metrics_upserted_total,
                _ => self.messages_imported_total,
            };
            counter!(name).increment(size as u64);
        } else {
            self.record_error("store", kind);
        }
    }

    /// Publish the member count per behavior type
    pub fn record_distribution(&self, distribution: &BehaviorDistribution) {
        for (behavior, count) in [
            ("champion", distribution.champion),
            ("contributing", distribution.contributing),
            ("curious", distribution.curious),
            ("encouraging", distribution.encouraging),
            ("quiet", distribution.quiet),
        ] {
            gauge!(self.members_by_behavior, "behavior" => behavior).set(count as f64);
        }
    }

    /// Record how long a pipeline stage took
    pub fn record_stage(&self, stage: &'static str, duration: Duration) {
        histogram!(self.stage_duration, "stage" => stage).record(duration.as_secs_f64());
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &'static str, operation: &'static str) {
        counter!(self.errors_total, "type" => error_type, "operation" => operation).increment(1);
    }
}
