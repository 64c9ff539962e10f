use chrono::NaiveDateTime;
use std::path::Path;

use crate::error::{EngagementError, Result};
use crate::models::{BehaviorType, MemberDirectoryEntry, MessageType, ISO_FORMAT};

/// Validation utilities for records crossing the storage boundary and for CLI input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

fn invalid(message: impl Into<String>) -> EngagementError {
    EngagementError::Validation(message.into())
}

impl InputValidator {
    /// Validate member id
    pub fn validate_member_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(invalid("Member id cannot be empty"));
        }

        if id.len() > 64 {
            return Err(invalid("Member id too long (max 64 characters)"));
        }

        Ok(())
    }

    /// Validate member full name
    pub fn validate_member_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("Member name cannot be empty"));
        }

        if name.len() > 100 {
            return Err(invalid("Member name too long (max 100 characters)"));
        }

        // Check for potentially dangerous characters
        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(invalid("Member name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate phone number format
    pub fn validate_phone(phone: &str) -> Result<()> {
        if phone.trim().is_empty() {
            return Err(invalid("Phone number cannot be empty"));
        }

        // Remove common formatting characters
        let cleaned = phone
            .chars()
            .filter(|c| {
                c.is_ascii_digit() || *c == '+' || *c == '-' || *c == '(' || *c == ')' || *c == ' '
            })
            .collect::<String>();

        if cleaned.len() != phone.len() {
            return Err(invalid("Phone number contains invalid characters"));
        }

        let digits_only = cleaned.chars().filter(char::is_ascii_digit).count();

        if !(7..=15).contains(&digits_only) {
            return Err(invalid("Phone number must be between 7 and 15 digits"));
        }

        if cleaned.chars().skip(1).any(|c| c == '+') {
            return Err(invalid("Phone number may only have + at the start"));
        }

        Ok(())
    }

    /// Validate a directory row and turn it into a typed entry.
    ///
    /// Blank phone numbers are normalized to `None`.
    pub fn validate_member(
        id: String,
        full_name: String,
        phone_number: Option<String>,
    ) -> Result<MemberDirectoryEntry> {
        Self::validate_member_id(&id)?;
        Self::validate_member_name(&full_name).map_err(|e| invalid(format!("member {id}: {e}")))?;

        Ok(MemberDirectoryEntry {
            id,
            full_name,
            phone_number: phone_number.filter(|p| !p.trim().is_empty()),
        })
    }

    /// Parse an ISO-8601 timestamp read back from storage
    pub fn parse_stored_timestamp(value: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, ISO_FORMAT)
            .map_err(|e| invalid(format!("Invalid stored timestamp '{value}': {e}")))
    }

    /// Parse a stored message type name
    pub fn parse_message_type(value: &str) -> Result<MessageType> {
        serde_json::from_value(serde_json::Value::String(value.to_string()))
            .map_err(|_| invalid(format!("Unknown message type '{value}'")))
    }

    /// Parse a stored behavior type name
    pub fn parse_behavior_type(value: &str) -> Result<BehaviorType> {
        BehaviorType::parse(value).ok_or_else(|| invalid(format!("Unknown behavior type '{value}'")))
    }

    /// Validate transcript file path
    pub fn validate_transcript_path(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(invalid("Transcript path cannot be empty"));
        }

        if !path.exists() {
            return Err(invalid(format!("Transcript does not exist: {}", path.display())));
        }

        if !path.is_file() {
            return Err(invalid(format!("Transcript is not a file: {}", path.display())));
        }

        Ok(())
    }

    /// Validate batch size for writes
    pub fn validate_batch_size(batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(invalid("Batch size must be greater than 0"));
        }

        if batch_size > 10000 {
            return Err(invalid("Batch size too large (max 10,000)"));
        }

        Ok(())
    }
}
