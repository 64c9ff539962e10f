use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{EngagementError, Result};
use crate::models::{
    EngagementMetrics, MemberDirectoryEntry, MessageRecord, MetricsRecord, NewMember, ISO_FORMAT,
};
use crate::repository::{MemberDirectory, MessageStore, MetricsStore};
use crate::schema::{chat_messages, engagement_metrics, members};
use crate::validation::InputValidator;

/// Pool of SQLite connections
pub type DbPool = Pool<SqliteConnectionManager>;
/// A connection checked out of the pool
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// SQLite-backed member directory, message store and metrics store
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at `database_url` with a default pool
    pub fn new(database_url: &str) -> Result<Self> {
        Self::with_pool_size(database_url, 10)
    }

    /// Open (or create) the database with at most `max_connections` pooled connections
    pub fn with_pool_size(database_url: &str, max_connections: u32) -> Result<Self> {
        let path = strip_scheme(database_url);

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!(
            "../migrations/2025-03-15-000000_create_tables/up.sql"
        ))?;
        conn.execute_batch(include_str!(
            "../migrations/2025-03-16-000000_unique_messages/up.sql"
        ))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Add a new member or update the name/phone of an existing one.
    ///
    /// Updating keeps the member's position in the directory order.
    pub fn add_or_update_member(&self, new_member: NewMember) -> Result<MemberDirectoryEntry> {
        let entry = InputValidator::validate_member(
            new_member.id,
            new_member.full_name,
            new_member.phone_number,
        )?;
        if let Some(phone) = &entry.phone_number {
            InputValidator::validate_phone(phone)?;
        }

        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} ({id}, {name}, {phone}) VALUES (?1, ?2, ?3)
                 ON CONFLICT({id}) DO UPDATE SET {name} = excluded.{name}, {phone} = excluded.{phone}",
                table = members::TABLE,
                id = members::ID,
                name = members::FULL_NAME,
                phone = members::PHONE_NUMBER,
            ),
            params![entry.id, entry.full_name, entry.phone_number],
        )?;

        Ok(entry)
    }

    /// Get a member by id
    pub fn get_member(&self, id: &str) -> Result<Option<MemberDirectoryEntry>> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {}, {}, {} FROM {} WHERE {} = ?",
                    members::ID,
                    members::FULL_NAME,
                    members::PHONE_NUMBER,
                    members::TABLE,
                    members::ID
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(id, name, phone)| InputValidator::validate_member(id, name, phone))
            .transpose()
    }

    /// All members in directory order (insertion order)
    pub fn list_members(&self) -> Result<Vec<MemberDirectoryEntry>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {} ASC",
            members::ID,
            members::FULL_NAME,
            members::PHONE_NUMBER,
            members::TABLE,
            members::ROWID
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, name, phone) = row?;
            results.push(InputValidator::validate_member(id, name, phone)?);
        }

        Ok(results)
    }

    /// Insert a batch of messages in a single transaction.
    ///
    /// A message already stored under the same sender, timestamp and raw line
    /// is not inserted again; its member resolution is refreshed instead.
    /// Returns how many records were new.
    pub fn insert_message_batch(&self, records: &[MessageRecord]) -> Result<usize> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                chat_messages::TABLE,
                chat_messages::MEMBER_ID,
                chat_messages::SENDER_NAME,
                chat_messages::MESSAGE_CONTENT,
                chat_messages::MESSAGE_TYPE,
                chat_messages::TIMESTAMP,
                chat_messages::IS_MATCHED,
                chat_messages::RAW_LINE
            ))?;
            let mut refresh = tx.prepare(&format!(
                "UPDATE {} SET {} = ?, {} = ? WHERE {} = ? AND {} = ? AND {} = ?",
                chat_messages::TABLE,
                chat_messages::MEMBER_ID,
                chat_messages::IS_MATCHED,
                chat_messages::SENDER_NAME,
                chat_messages::TIMESTAMP,
                chat_messages::RAW_LINE
            ))?;

            for record in records {
                let changed = insert.execute(params![
                    record.member_id,
                    record.sender_name,
                    record.message_content,
                    record.message_type.as_str(),
                    record.timestamp,
                    record.is_matched,
                    record.raw_line
                ])?;
                if changed == 0 {
                    refresh.execute(params![
                        record.member_id,
                        record.is_matched,
                        record.sender_name,
                        record.timestamp,
                        record.raw_line
                    ])?;
                } else {
                    inserted += changed;
                }
            }
        }
        tx.commit()?;

        debug!(
            count = records.len(),
            inserted,
            "Inserted message batch"
        );
        Ok(inserted)
    }

    /// Number of stored messages
    pub fn message_count(&self) -> Result<usize> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", chat_messages::TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Stored messages for one member, oldest first
    pub fn get_member_messages(&self, member_id: &str) -> Result<Vec<MessageRecord>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}, {}, {}, {}, {}, {} FROM {} WHERE {} = ? ORDER BY {} ASC, {} ASC",
            chat_messages::MEMBER_ID,
            chat_messages::SENDER_NAME,
            chat_messages::MESSAGE_CONTENT,
            chat_messages::MESSAGE_TYPE,
            chat_messages::TIMESTAMP,
            chat_messages::IS_MATCHED,
            chat_messages::RAW_LINE,
            chat_messages::TABLE,
            chat_messages::MEMBER_ID,
            chat_messages::TIMESTAMP,
            chat_messages::ID
        ))?;
        let rows = stmt.query_map(params![member_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (member_id, sender_name, message_content, message_type, timestamp, is_matched, raw_line) =
                row?;
            InputValidator::parse_stored_timestamp(&timestamp)?;
            results.push(MessageRecord {
                member_id,
                sender_name,
                message_content,
                message_type: InputValidator::parse_message_type(&message_type)?,
                timestamp,
                is_matched,
                raw_line,
            });
        }

        Ok(results)
    }

    /// `(member_id, timestamp)` for every matched message, in storage order
    pub fn get_matched_timestamps(&self) -> Result<Vec<(String, NaiveDateTime)>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {} FROM {} WHERE {} IS NOT NULL ORDER BY {} ASC",
            chat_messages::MEMBER_ID,
            chat_messages::TIMESTAMP,
            chat_messages::TABLE,
            chat_messages::MEMBER_ID,
            chat_messages::ID
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (member_id, timestamp) = row?;
            results.push((member_id, InputValidator::parse_stored_timestamp(&timestamp)?));
        }

        Ok(results)
    }

    /// Upsert a batch of metrics rows in a single transaction
    pub fn upsert_metrics_batch(&self, records: &[MetricsRecord]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} ({member}, {total}, {this_month}, {last_month}, {score}, {behavior}, {first}, {last}, {calculated})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT({member}) DO UPDATE SET
                    {total} = excluded.{total},
                    {this_month} = excluded.{this_month},
                    {last_month} = excluded.{last_month},
                    {score} = excluded.{score},
                    {behavior} = excluded.{behavior},
                    {first} = excluded.{first},
                    {last} = excluded.{last},
                    {calculated} = excluded.{calculated}",
                table = engagement_metrics::TABLE,
                member = engagement_metrics::MEMBER_ID,
                total = engagement_metrics::TOTAL_MESSAGES,
                this_month = engagement_metrics::MESSAGES_THIS_MONTH,
                last_month = engagement_metrics::MESSAGES_LAST_MONTH,
                score = engagement_metrics::ENGAGEMENT_SCORE,
                behavior = engagement_metrics::BEHAVIOR_TYPE,
                first = engagement_metrics::FIRST_MESSAGE_AT,
                last = engagement_metrics::LAST_MESSAGE_AT,
                calculated = engagement_metrics::LAST_CALCULATED_AT,
            ))?;

            for record in records {
                let m = &record.metrics;
                stmt.execute(params![
                    m.member_id,
                    m.total_messages,
                    m.messages_this_month,
                    m.messages_last_month,
                    m.engagement_score,
                    m.behavior_type.as_str(),
                    m.first_message_at.format(ISO_FORMAT).to_string(),
                    m.last_message_at.format(ISO_FORMAT).to_string(),
                    record.last_calculated_at.format(ISO_FORMAT).to_string(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(count = records.len(), "Upserted metrics batch");
        Ok(())
    }

    /// Stored metrics for one member
    pub fn get_metrics(&self, member_id: &str) -> Result<Option<MetricsRecord>> {
        Ok(self
            .list_metrics()?
            .into_iter()
            .find(|record| record.metrics.member_id == member_id))
    }

    /// All stored metrics, highest score first
    pub fn list_metrics(&self) -> Result<Vec<MetricsRecord>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY {} DESC, {} ASC",
            engagement_metrics::MEMBER_ID,
            engagement_metrics::TOTAL_MESSAGES,
            engagement_metrics::MESSAGES_THIS_MONTH,
            engagement_metrics::MESSAGES_LAST_MONTH,
            engagement_metrics::ENGAGEMENT_SCORE,
            engagement_metrics::BEHAVIOR_TYPE,
            engagement_metrics::FIRST_MESSAGE_AT,
            engagement_metrics::LAST_MESSAGE_AT,
            engagement_metrics::LAST_CALCULATED_AT,
            engagement_metrics::TABLE,
            engagement_metrics::ENGAGEMENT_SCORE,
            engagement_metrics::MEMBER_ID
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredMetricsRow {
                member_id: row.get(0)?,
                total_messages: row.get(1)?,
                messages_this_month: row.get(2)?,
                messages_last_month: row.get(3)?,
                engagement_score: row.get(4)?,
                behavior_type: row.get(5)?,
                first_message_at: row.get(6)?,
                last_message_at: row.get(7)?,
                last_calculated_at: row.get(8)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.into_record()?);
        }

        Ok(results)
    }
}

/// Untyped metrics row as read from SQLite, validated by `into_record`
struct StoredMetricsRow {
    member_id: String,
    total_messages: u32,
    messages_this_month: u32,
    messages_last_month: u32,
    engagement_score: u8,
    behavior_type: String,
    first_message_at: String,
    last_message_at: String,
    last_calculated_at: String,
}

impl StoredMetricsRow {
    fn into_record(self) -> Result<MetricsRecord> {
        if self.engagement_score > 100 {
            return Err(EngagementError::Validation(format!(
                "member {}: engagement score {} out of range",
                self.member_id, self.engagement_score
            )));
        }
        let first_message_at = InputValidator::parse_stored_timestamp(&self.first_message_at)?;
        let last_message_at = InputValidator::parse_stored_timestamp(&self.last_message_at)?;
        if first_message_at > last_message_at {
            return Err(EngagementError::Validation(format!(
                "member {}: first message after last message",
                self.member_id
            )));
        }

        Ok(MetricsRecord {
            metrics: EngagementMetrics {
                behavior_type: InputValidator::parse_behavior_type(&self.behavior_type)?,
                member_id: self.member_id,
                total_messages: self.total_messages,
                messages_this_month: self.messages_this_month,
                messages_last_month: self.messages_last_month,
                engagement_score: self.engagement_score,
                first_message_at,
                last_message_at,
            },
            last_calculated_at: InputValidator::parse_stored_timestamp(&self.last_calculated_at)?,
        })
    }
}

fn strip_scheme(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

#[async_trait]
impl MemberDirectory for Database {
    async fn fetch_members(&self) -> Result<Vec<MemberDirectoryEntry>> {
        self.list_members()
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn insert_messages(&self, records: &[MessageRecord]) -> Result<usize> {
        self.insert_message_batch(records)
    }

    async fn matched_message_timestamps(&self) -> Result<Vec<(String, NaiveDateTime)>> {
        self.get_matched_timestamps()
    }
}

#[async_trait]
impl MetricsStore for Database {
    async fn upsert_metrics(&self, records: &[MetricsRecord]) -> Result<()> {
        self.upsert_metrics_batch(records)
    }
}
