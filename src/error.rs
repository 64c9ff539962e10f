//! Error types for the chat-engagement library.
//!
//! This module provides custom error types using `thiserror` so that each
//! pipeline stage can report what went wrong without losing the cause.

use thiserror::Error;

/// Errors that can occur while importing a transcript or scoring members.
#[derive(Error, Debug)]
pub enum EngagementError {
    /// An entry line matched the transcript grammar but its date or time
    /// could not be interpreted. Fatal for the whole parse.
    #[error("Invalid timestamp on line {line}: {value}")]
    InvalidTimestamp {
        /// 1-based line number in the transcript
        line: usize,
        /// The offending date/time text
        value: String,
    },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A collaborator (directory or store) failed
    #[error("Store error: {0}")]
    Store(String),

    /// A record coming from a collaborator failed validation
    #[error("Invalid record: {0}")]
    Validation(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A regular expression failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience type alias for Result with `EngagementError`
pub type Result<T> = std::result::Result<T, EngagementError>;

impl From<config::ConfigError> for EngagementError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
