//! Ingestion orchestration.
//!
//! One run parses a transcript, resolves each distinct sender against the
//! member directory, stores every message in fixed-size batches and then
//! upserts engagement metrics for the matched members. Stages run strictly
//! in sequence; only batch writes tolerate failure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::matcher::IdentityMatcher;
use crate::metrics::MetricsCollector;
use crate::models::{BehaviorDistribution, EngagementMetrics, MessageRecord, MetricsRecord};
use crate::parser::TranscriptParser;
use crate::repository::{MemberDirectory, MessageStore, MetricsStore};
use crate::scoring::{distribution, group_by_member, EngagementScorer, MemberTimeline};
use crate::stats::MessageStats;
use crate::utils::{batch_count, numbered_batches};

/// Default number of records per store write
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of unmatched sender names written to the log
pub const DEFAULT_UNMATCHED_PREVIEW: usize = 10;

/// Outcome of one import run, returned to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Messages produced by the parser
    pub total_parsed: usize,
    /// Date range and per-type counts of the parsed transcript
    pub transcript: MessageStats,
    /// Distinct sender names in the transcript
    pub unique_senders: usize,
    /// Sender names resolved to a member
    pub matched_senders: usize,
    /// Sender names left unresolved, in first-seen order
    pub unmatched_senders: Vec<String>,
    /// Messages newly written to the message store
    pub messages_imported: usize,
    /// Messages already present from an earlier import of the same transcript
    pub duplicates_skipped: usize,
    /// Messages lost to failed batches
    pub import_errors: usize,
    /// Message batches that failed
    pub failed_batches: usize,
    /// Members whose metrics were upserted
    pub metrics_updated: usize,
    /// Members whose metrics upsert failed
    pub metrics_errors: usize,
    /// Members per behavior tier among the scored members
    pub behavior_distribution: BehaviorDistribution,
    /// True when the run stopped early on request
    pub aborted: bool,
}

/// Outcome of rescoring every stored matched message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationSummary {
    /// Matched messages read back from the store
    pub messages_considered: usize,
    /// Members with at least one matched message
    pub members_scored: usize,
    /// Members whose metrics were upserted
    pub metrics_updated: usize,
    /// Members whose metrics upsert failed
    pub metrics_errors: usize,
    /// Members per behavior tier
    pub behavior_distribution: BehaviorDistribution,
    /// True when the run stopped early on request
    pub aborted: bool,
}

#[derive(Debug, Default)]
struct MetricsWriteOutcome {
    updated: usize,
    errors: usize,
    aborted: bool,
}

/// Runs imports and recalculations against the storage collaborators
pub struct IngestPipeline<'a> {
    directory: &'a dyn MemberDirectory,
    message_store: &'a dyn MessageStore,
    metrics_store: &'a dyn MetricsStore,
    parser: TranscriptParser,
    matcher: IdentityMatcher,
    batch_size: usize,
    unmatched_preview: usize,
    abort: Option<Arc<AtomicBool>>,
    instruments: MetricsCollector,
}

impl<'a> IngestPipeline<'a> {
    /// Pipeline over the given collaborators with default settings
    pub fn new(
        directory: &'a dyn MemberDirectory,
        message_store: &'a dyn MessageStore,
        metrics_store: &'a dyn MetricsStore,
    ) -> Result<Self> {
        Ok(Self {
            directory,
            message_store,
            metrics_store,
            parser: TranscriptParser::new()?,
            matcher: IdentityMatcher::new()?,
            batch_size: DEFAULT_BATCH_SIZE,
            unmatched_preview: DEFAULT_UNMATCHED_PREVIEW,
            abort: None,
            instruments: MetricsCollector::default(),
        })
    }

    /// Apply batch size and log preview from configuration
    #[must_use]
    pub fn with_config(self, config: &IngestConfig) -> Self {
        self.with_batch_size(config.batch_size)
            .with_unmatched_preview(config.unmatched_preview)
    }

    /// Records per store write; zero is treated as one
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// How many unmatched sender names to log
    #[must_use]
    pub fn with_unmatched_preview(mut self, preview: usize) -> Self {
        self.unmatched_preview = preview;
        self
    }

    /// Flag that, once set, stops the run before its next batch
    #[must_use]
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn abort_requested(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Import one transcript end to end.
    ///
    /// A malformed timestamp or a directory failure ends the run with an
    /// error before anything is written. Failed batches are counted in the
    /// summary and the run carries on with the next one.
    pub async fn run(&self, transcript: &str, now: NaiveDateTime) -> Result<RunSummary> {
        let run_timer = OperationTimer::new("import");
        let mut summary = RunSummary::default();

        // Parse
        let started = Instant::now();
        let messages = self.parser.parse(transcript)?;
        let elapsed = started.elapsed();
        self.instruments.record_parse(messages.len(), elapsed);
        summary.total_parsed = messages.len();
        summary.transcript = MessageStats::from_messages(&messages);
        info!(
            messages = summary.transcript.total_messages,
            unique_senders = summary.transcript.unique_sender_count(),
            first = ?summary.transcript.first_timestamp,
            last = ?summary.transcript.last_timestamp,
            by_type = ?summary.transcript.by_type,
            "Transcript parsed"
        );

        // Resolve senders
        let started = Instant::now();
        let members = self.directory.fetch_members().await?;
        let matches = self.matcher.match_senders(
            messages.iter().map(|message| message.sender_name.as_str()),
            &members,
        );
        self.instruments.record_stage("match", started.elapsed());

        let unmatched = matches.unmatched();
        summary.unique_senders = matches.len();
        summary.matched_senders = matches.len() - unmatched.len();
        summary.unmatched_senders = unmatched.iter().map(ToString::to_string).collect();
        self.instruments
            .record_matching(summary.matched_senders, unmatched.len());
        info!(
            directory = members.len(),
            senders = summary.unique_senders,
            matched = summary.matched_senders,
            unmatched = unmatched.len(),
            "Senders resolved"
        );
        if !unmatched.is_empty() {
            let preview: Vec<&str> = unmatched
                .iter()
                .take(self.unmatched_preview)
                .copied()
                .collect();
            warn!(
                count = unmatched.len(),
                preview = ?preview,
                "Unmatched senders will be stored without a member"
            );
        }

        // Store messages
        let records: Vec<MessageRecord> = messages
            .iter()
            .map(|message| MessageRecord::from_parsed(message, matches.member_for(&message.sender_name)))
            .collect();
        let total_batches = batch_count(records.len(), self.batch_size);

        for (number, batch) in numbered_batches(&records, self.batch_size) {
            if self.abort_requested() {
                warn!(batch = number, total_batches, "Import aborted before batch");
                summary.aborted = true;
                run_timer.finish();
                return Ok(summary);
            }

            let started = Instant::now();
            match self.message_store.insert_messages(batch).await {
                Ok(inserted) => {
                    summary.messages_imported += inserted;
                    summary.duplicates_skipped += batch.len().saturating_sub(inserted);
                    self.instruments
                        .record_batch("messages", inserted, started.elapsed(), true);
                    debug!(
                        batch = number,
                        total_batches,
                        size = batch.len(),
                        inserted,
                        "Message batch stored"
                    );
                }
                Err(e) => {
                    summary.import_errors += batch.len();
                    summary.failed_batches += 1;
                    self.instruments
                        .record_batch("messages", batch.len(), started.elapsed(), false);
                    warn!(batch = number, total_batches, error = %e, "Message batch failed");
                }
            }
        }
        info!(
            imported = summary.messages_imported,
            duplicates = summary.duplicates_skipped,
            failed = summary.import_errors,
            "Messages stored"
        );

        // Score and store metrics
        let timeline = group_by_member(&messages, &matches);
        let scored = EngagementScorer::new(now).score(&timeline);
        summary.behavior_distribution = distribution(scored.values());

        let outcome = self.write_metrics(&scored, now).await;
        summary.metrics_updated = outcome.updated;
        summary.metrics_errors = outcome.errors;
        summary.aborted = outcome.aborted;

        self.instruments
            .record_distribution(&summary.behavior_distribution);
        self.instruments
            .record_stage("import", run_timer.finish());
        Ok(summary)
    }

    /// Rescore every member from the matched messages already in the store.
    ///
    /// Store read failures propagate; metrics batches fail independently.
    pub async fn recalculate(&self, now: NaiveDateTime) -> Result<RecalculationSummary> {
        let run_timer = OperationTimer::new("recalculate");

        let stored = self.message_store.matched_message_timestamps().await?;
        let messages_considered = stored.len();

        let mut timeline = MemberTimeline::new();
        for (member_id, timestamp) in stored {
            timeline.entry(member_id).or_default().push(timestamp);
        }

        let scored = EngagementScorer::new(now).score(&timeline);
        let behavior_distribution = distribution(scored.values());
        info!(
            messages = messages_considered,
            members = scored.len(),
            "Recalculating engagement metrics"
        );

        let outcome = self.write_metrics(&scored, now).await;

        self.instruments.record_distribution(&behavior_distribution);
        self.instruments
            .record_stage("recalculate", run_timer.finish());
        Ok(RecalculationSummary {
            messages_considered,
            members_scored: scored.len(),
            metrics_updated: outcome.updated,
            metrics_errors: outcome.errors,
            behavior_distribution,
            aborted: outcome.aborted,
        })
    }

    async fn write_metrics(
        &self,
        scored: &BTreeMap<String, EngagementMetrics>,
        now: NaiveDateTime,
    ) -> MetricsWriteOutcome {
        let records: Vec<MetricsRecord> = scored
            .values()
            .map(|metrics| MetricsRecord {
                metrics: metrics.clone(),
                last_calculated_at: now,
            })
            .collect();
        let mut outcome = MetricsWriteOutcome::default();

        for (number, batch) in numbered_batches(&records, self.batch_size) {
            if self.abort_requested() {
                warn!(batch = number, "Metrics update aborted before batch");
                outcome.aborted = true;
                break;
            }

            let started = Instant::now();
            match self.metrics_store.upsert_metrics(batch).await {
                Ok(()) => {
                    outcome.updated += batch.len();
                    self.instruments
                        .record_batch("metrics", batch.len(), started.elapsed(), true);
                }
                Err(e) => {
                    outcome.errors += batch.len();
                    self.instruments
                        .record_batch("metrics", batch.len(), started.elapsed(), false);
                    warn!(batch = number, error = %e, "Metrics batch failed");
                }
            }
        }

        info!(
            updated = outcome.updated,
            failed = outcome.errors,
            "Engagement metrics stored"
        );
        outcome
    }
}
