//! Durable task records.
//!
//! Status values are stored as text; the state machine that governs them
//! lives in `mentor-tasks`. Writes are compare-and-set on the current status
//! so two workers can never both move a task out of the same state.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use mentor_core::error::{MentorError, Result};
use mentor_core::types::datetime_from_millis;

use crate::db::Database;
use crate::repository::parse_uuid;

/// One row of the `tasks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    db: Database,
}

impl TaskRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a freshly dispatched task in the `pending` state.
    pub fn insert(&self, id: Uuid, kind: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, kind, status, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', ?3, ?3)",
                rusqlite::params![id.to_string(), kind, now],
            )
            .map_err(|e| MentorError::Storage(format!("Failed to insert task: {}", e)))?;
            Ok(())
        })
    }

    pub fn get(&self, id: Uuid) -> Result<Option<TaskRow>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, status, result, error, created_at, updated_at
                 FROM tasks WHERE id = ?1",
                rusqlite::params![id.to_string()],
                row_to_task,
            )
            .optional()
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// Move a task from `expected` to `status`, replacing result and error.
    ///
    /// Returns `false` if the task was not in `expected` (or does not exist).
    pub fn update_state(
        &self,
        id: Uuid,
        expected: &str,
        status: &str,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE tasks SET status = ?1, result = ?2, error = ?3, updated_at = ?4
                     WHERE id = ?5 AND status = ?6",
                    rusqlite::params![status, result, error, now, id.to_string(), expected],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to update task: {}", e)))?;
            Ok(changed == 1)
        })
    }

    /// Tasks still pending or running, oldest first.
    pub fn list_unfinished(&self) -> Result<Vec<TaskRow>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, kind, status, result, error, created_at, updated_at
                     FROM tasks WHERE status IN ('pending', 'running')
                     ORDER BY created_at ASC",
                )
                .map_err(|e| MentorError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_task)
                .map_err(|e| MentorError::Storage(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| MentorError::Storage(e.to_string()))
        })
    }

    /// Remove a task record. Used when a dispatch never reached a worker.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM tasks WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to delete task: {}", e)))?;
            Ok(removed > 0)
        })
    }
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    let id: String = row.get(0)?;
    Ok(TaskRow {
        id: parse_uuid(0, &id)?,
        kind: row.get(1)?,
        status: row.get(2)?,
        result: row.get(3)?,
        error: row.get(4)?,
        created_at: datetime_from_millis(row.get(5)?),
        updated_at: datetime_from_millis(row.get(6)?),
    })
}
