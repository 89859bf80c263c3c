//! SQLite-backed session history.
//!
//! Each turn is one `chat_message` row whose `message` column holds the
//! JSON payload `{"type": ..., "content": ...}`.

use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use mentor_core::error::{MentorError, Result};
use mentor_core::history::SessionHistoryStore;
use mentor_core::types::{datetime_from_millis, ChatMessage, Turn};

use crate::db::Database;

/// History store over the pooled database.
///
/// A connection is held for one read or one append, never across calls.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SessionHistoryStore for SqliteHistoryStore {
    fn read_history(&self, session_id: Uuid) -> Result<Vec<Turn>> {
        self.db.with_conn(|conn| read_turns(conn, session_id))
    }

    fn append_turn(&self, session_id: Uuid, message: &ChatMessage) -> Result<()> {
        self.db
            .with_conn(|conn| insert_turn(conn, session_id, message))
    }

    fn append_turns(&self, session_id: Uuid, messages: &[ChatMessage]) -> Result<()> {
        self.db.with_transaction(|tx| {
            for message in messages {
                insert_turn(tx, session_id, message)?;
            }
            Ok(())
        })?;
        debug!(session_id = %session_id, count = messages.len(), "Appended turns");
        Ok(())
    }
}

pub(crate) fn read_turns(conn: &Connection, session_id: Uuid) -> Result<Vec<Turn>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, message, created_at FROM chat_message
             WHERE session_id = ?1
             ORDER BY id ASC",
        )
        .map_err(|e| MentorError::Storage(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::params![session_id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| MentorError::Storage(e.to_string()))?;

    let mut turns = Vec::new();
    for row in rows {
        let (id, payload, created_at) = row.map_err(|e| MentorError::Storage(e.to_string()))?;
        let message: ChatMessage = serde_json::from_str(&payload)?;
        turns.push(Turn {
            id,
            session_id,
            message,
            created_at: datetime_from_millis(created_at),
        });
    }
    Ok(turns)
}

fn insert_turn(conn: &Connection, session_id: Uuid, message: &ChatMessage) -> Result<()> {
    let payload = serde_json::to_string(message)?;
    conn.execute(
        "INSERT INTO chat_message (session_id, message, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            session_id.to_string(),
            payload,
            Utc::now().timestamp_millis()
        ],
    )
    .map_err(|e| MentorError::Storage(format!("Failed to append turn: {}", e)))?;
    Ok(())
}
