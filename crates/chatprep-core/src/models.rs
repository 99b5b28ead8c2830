//! Core data models shared by the grouping transform and the CLI.
//!
//! [`ChatMessage`] is the normalized input record written by the upstream
//! export parsers. [`Turn`] is what survives into staging and training files:
//! role and text only, with timestamps and sender names stripped.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// Speaker role of a message or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized chat message.
///
/// Extra fields present in the source JSON (for example Slack's `user_id`)
/// are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, name: &str, content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.to_string(),
            name: name.to_string(),
            timestamp,
        }
    }

    /// Normalized chat input carries only `user` and `assistant` messages.
    pub fn check_normalized(&self) -> Result<(), CoreError> {
        match self.role {
            Role::User | Role::Assistant => Ok(()),
            Role::System => Err(CoreError::RoleNotAllowed(self.role.to_string())),
        }
    }
}

/// One emitted entry of a training block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An accepted conversation block produced by the grouping transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBlock {
    /// Alternating user/assistant turns, starting with a user turn.
    pub turns: Vec<Turn>,
    /// Distinct sender names seen while the group was open.
    pub members: BTreeSet<String>,
    /// Number of source messages merged into `turns`.
    pub source_messages: usize,
}

/// Staging line for chat data: `{"messages": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedChat {
    pub messages: Vec<Turn>,
}

impl From<ChatBlock> for StagedChat {
    fn from(block: ChatBlock) -> Self {
        Self {
            messages: block.turns,
        }
    }
}

/// Staging/training line for plain text: `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    pub text: String,
}

/// Parse an RFC 3339 timestamp, falling back to naive ISO 8601 read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(CoreError::InvalidTimestamp(raw.to_string()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
