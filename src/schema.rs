//! Database schema definitions
//!
//! This module provides constants for table and column names used with rusqlite.

/// Members table schema (the member directory)
pub mod members {
    /// Table name
    pub const TABLE: &str = "members";
    /// Primary key column
    pub const ID: &str = "id";
    /// Full name column
    pub const FULL_NAME: &str = "full_name";
    /// Phone number column
    pub const PHONE_NUMBER: &str = "phone_number";
    /// Implicit insertion-order column, used as the directory order
    pub const ROWID: &str = "rowid";
}

/// Imported chat messages table schema
pub mod chat_messages {
    /// Table name
    pub const TABLE: &str = "chat_messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Resolved member column (NULL when unmatched)
    pub const MEMBER_ID: &str = "member_id";
    /// Raw sender label column
    pub const SENDER_NAME: &str = "sender_name";
    /// Message body column
    pub const MESSAGE_CONTENT: &str = "message_content";
    /// Message type column
    pub const MESSAGE_TYPE: &str = "message_type";
    /// ISO-8601 timestamp column
    pub const TIMESTAMP: &str = "timestamp";
    /// Flag indicating a resolved member
    pub const IS_MATCHED: &str = "is_matched";
    /// Original transcript slice column
    pub const RAW_LINE: &str = "raw_line";
}

/// Engagement metrics table schema
pub mod engagement_metrics {
    /// Table name
    pub const TABLE: &str = "engagement_metrics";
    /// Primary key column, one row per member
    pub const MEMBER_ID: &str = "member_id";
    /// Total matched messages column
    pub const TOTAL_MESSAGES: &str = "total_messages";
    /// Messages this month column
    pub const MESSAGES_THIS_MONTH: &str = "messages_this_month";
    /// Messages last month column
    pub const MESSAGES_LAST_MONTH: &str = "messages_last_month";
    /// Engagement score column
    pub const ENGAGEMENT_SCORE: &str = "engagement_score";
    /// Behavior type column
    pub const BEHAVIOR_TYPE: &str = "behavior_type";
    /// First message timestamp column
    pub const FIRST_MESSAGE_AT: &str = "first_message_at";
    /// Last message timestamp column
    pub const LAST_MESSAGE_AT: &str = "last_message_at";
    /// Calculation timestamp column
    pub const LAST_CALCULATED_AT: &str = "last_calculated_at";
}
