//! Storage contracts the pipeline depends on.
//!
//! The member directory is read-only to the pipeline. Messages are keyed by
//! sender, timestamp and raw line, and metrics by member id, so a full re-run
//! converges on the same state.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::{MemberDirectoryEntry, MessageRecord, MetricsRecord};

/// Read access to the known community members
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// All members, in the directory's canonical order
    async fn fetch_members(&self) -> Result<Vec<MemberDirectoryEntry>>;
}

/// Write access to imported transcript messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one batch; the batch either lands whole or fails whole.
    ///
    /// Records already stored are not duplicated. Returns how many were new.
    async fn insert_messages(&self, records: &[MessageRecord]) -> Result<usize>;

    /// `(member_id, timestamp)` for every stored message with a resolved member
    async fn matched_message_timestamps(&self) -> Result<Vec<(String, NaiveDateTime)>>;
}

/// Upsert access to per-member engagement metrics
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Insert or replace metrics keyed by member id
    async fn upsert_metrics(&self, records: &[MetricsRecord]) -> Result<()>;
}
