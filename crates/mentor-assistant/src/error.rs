//! Error types for the conversation engine.

use mentor_core::config::AiPlatform;

use crate::prompts::{PromptRole, Purpose};

/// Errors from prompt loading, model providers and pipelines.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("prompt not found: {purpose}/{role}")]
    PromptNotFound { purpose: Purpose, role: PromptRole },
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),
    #[error("provider not implemented: {0}")]
    ProviderNotImplemented(AiPlatform),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Provider(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
