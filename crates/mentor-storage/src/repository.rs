//! Repository implementations for SQLite-backed persistence.
//!
//! Provides OwnerRepository and SessionRepository that operate on the
//! pooled Database using raw SQL.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use mentor_core::error::{MentorError, Result};
use mentor_core::types::{datetime_from_millis, Owner, OwnerId, Session, SessionDetails};

use crate::db::Database;
use crate::history::read_turns;

/// Stored credentials of an owner, used to authenticate a login.
#[derive(Debug, Clone)]
pub struct OwnerCredentials {
    pub owner: Owner,
    pub password_hash: String,
    pub api_token: String,
}

/// Repository for registered owners (the owner directory).
#[derive(Debug, Clone)]
pub struct OwnerRepository {
    db: Database,
}

impl OwnerRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new owner. Fails with `Conflict` if the username is taken.
    pub fn create(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
        api_token: &str,
    ) -> Result<Owner> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash, api_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![username, email, password_hash, api_token, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    MentorError::Conflict(format!("username already registered: {}", username))
                } else {
                    MentorError::Storage(format!("Failed to create user: {}", e))
                }
            })?;

            Ok(Owner {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                email: email.map(str::to_string),
                created_at: datetime_from_millis(now),
            })
        })
    }

    /// Look up an owner by id.
    pub fn find_by_id(&self, id: OwnerId) -> Result<Option<Owner>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, created_at FROM users WHERE id = ?1",
                rusqlite::params![id],
                row_to_owner,
            )
            .optional()
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// Resolve a bearer token to its owner.
    pub fn find_by_token(&self, token: &str) -> Result<Option<Owner>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, created_at FROM users WHERE api_token = ?1",
                rusqlite::params![token],
                row_to_owner,
            )
            .optional()
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// Fetch the stored credentials for a username.
    pub fn find_credentials(&self, username: &str) -> Result<Option<OwnerCredentials>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, created_at, password_hash, api_token
                 FROM users WHERE username = ?1",
                rusqlite::params![username],
                |row| {
                    Ok(OwnerCredentials {
                        owner: row_to_owner(row)?,
                        password_hash: row.get(4)?,
                        api_token: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// Delete an owner together with all of their sessions and turns.
    pub fn delete(&self, id: OwnerId) -> Result<bool> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])
                .map_err(|e| MentorError::Storage(format!("Failed to delete user: {}", e)))?;
            Ok(removed > 0)
        })
    }
}

/// Repository for conversation sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: Database,
}

impl SessionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a session under a caller-generated identifier.
    pub fn create(&self, id: Uuid, owner_id: OwnerId, title: &str) -> Result<Session> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_session (id, user_id, created_at, title) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), owner_id, now, title],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    MentorError::Conflict(format!("Failed to create session {}: {}", id, e))
                } else {
                    MentorError::Storage(format!("Failed to create session: {}", e))
                }
            })?;
            Ok(Session {
                id,
                owner_id,
                title: title.to_string(),
                created_at: datetime_from_millis(now),
            })
        })
    }

    /// Fetch a session only if it belongs to `owner_id`.
    pub fn get(&self, owner_id: OwnerId, id: Uuid) -> Result<Option<Session>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, title, created_at FROM chat_session
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id.to_string(), owner_id],
                row_to_session,
            )
            .optional()
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// List an owner's sessions, newest first.
    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<Session>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, created_at FROM chat_session
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| MentorError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![owner_id], row_to_session)
                .map_err(|e| MentorError::Storage(e.to_string()))?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// A session with its full ordered history, if it belongs to `owner_id`.
    pub fn details(&self, owner_id: OwnerId, id: Uuid) -> Result<Option<SessionDetails>> {
        self.db.with_conn(|conn| {
            let session = conn
                .query_row(
                    "SELECT id, user_id, title, created_at FROM chat_session
                     WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id.to_string(), owner_id],
                    row_to_session,
                )
                .optional()
                .map_err(|e| MentorError::Storage(e.to_string()))?;

            match session {
                Some(session) => {
                    let turns = read_turns(conn, id)?;
                    Ok(Some(SessionDetails { session, turns }))
                }
                None => Ok(None),
            }
        })
    }

    /// Delete a session owned by `owner_id`; its turns cascade.
    ///
    /// Returns `false` when no such session exists for that owner.
    pub fn delete(&self, owner_id: OwnerId, id: Uuid) -> Result<bool> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM chat_session WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id.to_string(), owner_id],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to delete session: {}", e)))?;
            Ok(removed > 0)
        })
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn row_to_owner(row: &Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: datetime_from_millis(row.get(3)?),
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    Ok(Session {
        id: parse_uuid(0, &id)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        created_at: datetime_from_millis(row.get(3)?),
    })
}

pub(crate) fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}
