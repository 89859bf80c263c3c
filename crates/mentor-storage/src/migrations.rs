//! Database schema migrations.
//!
//! Applies the initial schema: users, chat_session, chat_message, tasks and
//! the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use mentor_core::error::{MentorError, Result};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MentorError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MentorError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Timestamps are epoch milliseconds. Turns are ordered by their
/// autoincrement id, which follows insertion order.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT,
            password_hash   TEXT NOT NULL,
            api_token       TEXT NOT NULL UNIQUE,
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_session (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         INTEGER NOT NULL,
            created_at      INTEGER NOT NULL,
            title           TEXT NOT NULL DEFAULT ''
                            CHECK (length(title) <= 255),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_session_user
            ON chat_session (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS chat_message (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      TEXT NOT NULL,
            message         TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_session(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_message_session
            ON chat_message (session_id, id ASC);

        CREATE TABLE IF NOT EXISTS tasks (
            id              TEXT PRIMARY KEY NOT NULL,
            kind            TEXT NOT NULL
                            CHECK (kind IN ('analysis', 'follow_up')),
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'running', 'succeeded', 'failed')),
            result          TEXT,
            error           TEXT,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| MentorError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
