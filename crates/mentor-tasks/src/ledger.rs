//! Durable task ledger.
//!
//! Wraps the `tasks` table with typed statuses and validated transitions.

use tracing::{debug, warn};
use uuid::Uuid;

use mentor_storage::{TaskRepository, TaskRow};

use crate::error::{Result, TaskError};
use crate::state_machine::validate_transition;
use crate::types::{TaskKind, TaskRecord, TaskStatus, TaskStatusView};

#[derive(Debug, Clone)]
pub struct TaskLedger {
    repo: TaskRepository,
}

impl TaskLedger {
    pub fn new(repo: TaskRepository) -> Self {
        Self { repo }
    }

    /// Record a new pending task under a fresh identifier.
    pub fn create(&self, kind: TaskKind) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.repo.insert(id, kind.as_str())?;
        debug!(task_id = %id, kind = %kind, "Task recorded");
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Result<TaskRecord> {
        let row = self.repo.get(id)?.ok_or(TaskError::NotFound(id))?;
        to_record(row)
    }

    /// Status projection for `id`.
    pub fn status(&self, id: Uuid) -> Result<TaskStatusView> {
        Ok(self.get(id)?.view())
    }

    /// Move a task to `to`, validating the transition against its current
    /// status. Only succeeded tasks keep `result`, only failed ones `error`.
    pub fn transition(
        &self,
        id: Uuid,
        to: TaskStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let current = self.get(id)?;
        validate_transition(current.status, to)?;

        let result = if to == TaskStatus::Succeeded { result } else { None };
        let error = if to == TaskStatus::Failed {
            Some(error.unwrap_or_default())
        } else {
            None
        };

        let applied = self
            .repo
            .update_state(id, current.status.as_str(), to.as_str(), result, error)?;
        if !applied {
            // Someone else moved it between our read and write.
            let now = self.get(id)?.status;
            return Err(TaskError::InvalidTransition(now, to));
        }
        debug!(task_id = %id, from = %current.status, to = %to, "Task transitioned");
        Ok(())
    }

    /// Forget a task that never reached a worker.
    pub fn discard(&self, id: Uuid) -> Result<()> {
        self.repo.delete(id)?;
        Ok(())
    }

    /// Fail a task that has not finished, passing through `running` when it
    /// is still pending. Terminal tasks are left as they are.
    pub fn abandon(&self, id: Uuid, error: &str) -> Result<()> {
        let status = self.get(id)?.status;
        if status.is_terminal() {
            return Ok(());
        }
        if status == TaskStatus::Pending {
            self.transition(id, TaskStatus::Running, None, None)?;
        }
        self.transition(id, TaskStatus::Failed, None, Some(error))?;
        warn!(task_id = %id, error, "Task abandoned");
        Ok(())
    }

    /// Fail every task left pending or running by a previous process.
    ///
    /// Job payloads are not persisted, so such tasks cannot be resumed.
    pub fn fail_interrupted(&self) -> Result<usize> {
        let mut failed = 0;
        for row in self.repo.list_unfinished()? {
            self.abandon(row.id, "task interrupted by restart")?;
            failed += 1;
        }
        if failed > 0 {
            warn!(count = failed, "Failed tasks interrupted by restart");
        }
        Ok(failed)
    }

    /// Identifiers of every task still pending or running.
    pub fn unfinished(&self) -> Result<Vec<Uuid>> {
        Ok(self.repo.list_unfinished()?.into_iter().map(|row| row.id).collect())
    }
}

fn to_record(row: TaskRow) -> Result<TaskRecord> {
    let kind = row
        .kind
        .parse::<TaskKind>()
        .map_err(|e| TaskError::Storage(mentor_core::MentorError::Storage(e)))?;
    let status = row
        .status
        .parse::<TaskStatus>()
        .map_err(|e| TaskError::Storage(mentor_core::MentorError::Storage(e)))?;
    Ok(TaskRecord {
        id: row.id,
        kind,
        status,
        result: row.result,
        error: row.error,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
