//! History-aware conversation pipelines.
//!
//! A pipeline binds one purpose's system prompt to the active model and the
//! history store. The session is supplied per invocation, so a single built
//! pipeline serves every session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};
use uuid::Uuid;

use mentor_core::history::SessionHistoryStore;
use mentor_core::types::{ChatMessage, Turn};

use crate::error::{AssistantError, Result};
use crate::prompts::{PromptCatalog, PromptRole, Purpose};
use crate::provider::{ChatModel, ModelResponse};

/// System prompt, then the session history, then the human input.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: Arc<str>,
}

impl PromptTemplate {
    pub fn new(system: Arc<str>) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Render the message list sent to the model.
    pub fn render(&self, history: &[Turn], input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system.as_ref()));
        messages.extend(history.iter().map(|t| t.message.clone()));
        messages.push(ChatMessage::human(input));
        messages
    }
}

/// One purpose's composed prompt, model and history accessor.
pub struct ConversationPipeline {
    purpose: Purpose,
    template: PromptTemplate,
    model: Arc<dyn ChatModel>,
    history: Arc<dyn SessionHistoryStore>,
}

impl ConversationPipeline {
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Run one exchange against `session_id`.
    ///
    /// Reads the history, calls the model, then appends the human input and
    /// the model's reply as one pair. Nothing is appended if the model call
    /// fails.
    pub async fn invoke(&self, session_id: Uuid, input: &str) -> Result<ModelResponse> {
        let history = self
            .history
            .read_history(session_id)
            .map_err(|e| AssistantError::HistoryUnavailable(e.to_string()))?;

        let messages = self.template.render(&history, input);
        debug!(
            purpose = %self.purpose,
            session_id = %session_id,
            history_turns = history.len(),
            "Invoking model"
        );

        let response = match self.model.invoke(&messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    purpose = %self.purpose,
                    session_id = %session_id,
                    provider = self.model.name(),
                    error = %e,
                    "Model invocation failed"
                );
                return Err(e);
            }
        };

        self.history
            .append_turns(
                session_id,
                &[
                    ChatMessage::human(input),
                    ChatMessage::ai(response.content.clone()),
                ],
            )
            .map_err(|e| AssistantError::HistoryUnavailable(e.to_string()))?;

        Ok(response)
    }
}

impl std::fmt::Debug for ConversationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationPipeline")
            .field("purpose", &self.purpose)
            .field("provider", &self.model.name())
            .finish_non_exhaustive()
    }
}

/// Builds pipelines and memoizes them per purpose.
pub struct PipelineBuilder {
    catalog: Arc<PromptCatalog>,
    model: Arc<dyn ChatModel>,
    history: Arc<dyn SessionHistoryStore>,
    built: RwLock<HashMap<Purpose, Arc<ConversationPipeline>>>,
}

impl PipelineBuilder {
    pub fn new(
        catalog: Arc<PromptCatalog>,
        model: Arc<dyn ChatModel>,
        history: Arc<dyn SessionHistoryStore>,
    ) -> Self {
        Self {
            catalog,
            model,
            history,
            built: RwLock::new(HashMap::new()),
        }
    }

    /// Return the pipeline for `purpose`, constructing it on first request.
    pub fn build(&self, purpose: Purpose) -> Result<Arc<ConversationPipeline>> {
        if let Ok(built) = self.built.read() {
            if let Some(pipeline) = built.get(&purpose) {
                return Ok(Arc::clone(pipeline));
            }
        }

        let mut built = self
            .built
            .write()
            .map_err(|e| AssistantError::Config(format!("pipeline cache poisoned: {}", e)))?;
        if let Some(pipeline) = built.get(&purpose) {
            return Ok(Arc::clone(pipeline));
        }

        let system = self.catalog.get_prompt(purpose, PromptRole::System)?;
        let pipeline = Arc::new(ConversationPipeline {
            purpose,
            template: PromptTemplate::new(system),
            model: Arc::clone(&self.model),
            history: Arc::clone(&self.history),
        });
        built.insert(purpose, Arc::clone(&pipeline));
        info!(purpose = %purpose, provider = self.model.name(), "Built conversation pipeline");
        Ok(pipeline)
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    pub fn catalog(&self) -> &Arc<PromptCatalog> {
        &self.catalog
    }
}
