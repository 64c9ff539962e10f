//! Chat Engagement - Transcript Import and Member Scoring
//!
//! A Rust library that imports exported group-chat transcripts, resolves
//! free-text sender names to known community members and scores each
//! member's engagement.
//!
//! # Features
//!
//! - Parse WhatsApp-style transcripts, including multi-line messages and polls
//! - Classify messages as text, media, poll or system events
//! - Fuzzy sender-to-member resolution with deterministic tie-breaking
//! - Engagement scoring with recency weighting and behavior tiers
//! - Batched, failure-tolerant storage through pluggable collaborators

/// Message classification
pub mod classifier;
/// Configuration management
pub mod config;
/// SQLite storage and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Sender identity resolution
pub mod matcher;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Import orchestration
pub mod pipeline;
/// Transcript parsing
pub mod parser;
/// Storage collaborator traits
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Engagement scoring
pub mod scoring;
/// Transcript statistics
pub mod stats;
/// Batching helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{EngagementError, Result};
pub use matcher::IdentityMatcher;
pub use models::{BehaviorType, EngagementMetrics, MemberDirectoryEntry, MessageType, ParsedMessage};
pub use parser::TranscriptParser;
pub use pipeline::{IngestPipeline, RecalculationSummary, RunSummary};
pub use scoring::EngagementScorer;
