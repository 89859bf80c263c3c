//! Error types for task dispatch and execution.

use mentor_assistant::AssistantError;
use mentor_core::error::MentorError;
use uuid::Uuid;

use crate::types::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(TaskStatus, TaskStatus),
    #[error("Owner not found: {0}")]
    OwnerNotFound(i64),
    #[error("Task queue error: {0}")]
    Queue(String),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error("Storage error: {0}")]
    Storage(#[from] MentorError),
}

pub type Result<T> = std::result::Result<T, TaskError>;
