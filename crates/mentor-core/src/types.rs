//! Core domain types shared across all Mentor crates.
//!
//! Sessions are conversation threads owned by one registered user; turns are
//! the immutable, ordered messages inside a session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a registered owner (user row id).
pub type OwnerId = i64;

// =============================================================================
// Messages
// =============================================================================

/// Author of a chat message.
///
/// Serialized as the lowercase tag stored under the `type` key of a persisted
/// turn payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Ai,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::Human => write!(f, "human"),
            Role::Ai => write!(f, "ai"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "human" => Ok(Role::Human),
            "ai" => Ok(Role::Ai),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A role-tagged message, as sent to a model and as persisted in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }
}

// =============================================================================
// Persisted entities
// =============================================================================

/// One immutable entry in a session's history.
///
/// `id` is monotonically increasing in storage order and defines the
/// position of the turn within its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub session_id: Uuid,
    pub message: ChatMessage,
    pub created_at: DateTime<Utc>,
}

/// A registered caller that owns sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A conversation thread. Created once, at the start of a text analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A session together with its full, ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session: Session,
    pub turns: Vec<Turn>,
}

/// Convert epoch milliseconds (the storage representation) to a UTC datetime.
pub fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
