//! Task types: lifecycle status, kind and the caller-visible projection.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Analysis,
    FollowUp,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Analysis => "analysis",
            TaskKind::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(TaskKind::Analysis),
            "follow_up" => Ok(TaskKind::FollowUp),
            _ => Err(format!("Unknown task kind: {}", s)),
        }
    }
}

/// Coarse outcome exposed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Accepted, not yet complete.
    Accepted,
    /// Complete, result (if any) attached.
    Complete,
    /// Complete, error attached.
    Errored,
}

/// Normalized view of one task.
///
/// `result` is only ever set for succeeded tasks and `error` only for failed
/// ones. A succeeded task may still carry no result: an analysis that had
/// nothing to do completes without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskStatusView {
    /// Build a view, dropping any field the status does not allow.
    pub fn project(
        task_id: Uuid,
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> Self {
        let (result, error) = match status {
            TaskStatus::Pending | TaskStatus::Running => (None, None),
            TaskStatus::Succeeded => (result, None),
            TaskStatus::Failed => (None, Some(error.unwrap_or_default())),
        };
        Self {
            task_id,
            status,
            result,
            error,
        }
    }

    pub fn outcome(&self) -> TaskOutcome {
        match self.status {
            TaskStatus::Pending | TaskStatus::Running => TaskOutcome::Accepted,
            TaskStatus::Succeeded => TaskOutcome::Complete,
            TaskStatus::Failed => TaskOutcome::Errored,
        }
    }
}

/// A durable task record.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn view(&self) -> TaskStatusView {
        TaskStatusView::project(self.id, self.status, self.result.clone(), self.error.clone())
    }
}

/// Handles returned by a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub session_id: Uuid,
    pub task_id: Uuid,
}
