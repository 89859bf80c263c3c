//! Chat-completion provider abstraction.
//!
//! Exactly one provider is active per deployment. It is resolved once from
//! [`ProviderConfig`] at startup; platforms without an implementation fail
//! there rather than on the first request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use mentor_core::config::{AiPlatform, ProviderConfig};
use mentor_core::types::ChatMessage;

use crate::error::{AssistantError, Result};
use crate::together::TogetherAiModel;

/// Content returned by one completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A hosted chat-completion backend.
///
/// No retries happen at this layer; transport failures surface as
/// [`AssistantError::Provider`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name for logs (e.g. "together.ai").
    fn name(&self) -> &str;

    /// Send role-tagged messages and return the completion.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ModelResponse>;
}

/// Resolve the configured platform into a concrete model.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match config.platform {
        AiPlatform::TogetherAi => Arc::new(TogetherAiModel::from_config(config)?),
        platform @ (AiPlatform::OpenAi | AiPlatform::AwsBedrock | AiPlatform::AzureOpenAi) => {
            return Err(AssistantError::ProviderNotImplemented(platform));
        }
    };
    info!(
        provider = model.name(),
        model = %config.model,
        temperature = config.temperature,
        "Chat model provider ready"
    );
    Ok(model)
}
