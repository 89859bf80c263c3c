//! The conversation orchestrator.
//!
//! Stateless apart from the memoized pipelines: every operation delegates to
//! a pipeline (analysis, follow-up) or straight to the model (titles).

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use mentor_core::history::SessionHistoryStore;
use mentor_core::types::ChatMessage;

use crate::error::Result;
use crate::pipeline::PipelineBuilder;
use crate::prompts::{PromptCatalog, PromptRole, Purpose};
use crate::provider::ChatModel;

/// Longest title a session can hold, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

pub struct Assistant {
    pipelines: PipelineBuilder,
}

impl Assistant {
    pub fn new(
        catalog: Arc<PromptCatalog>,
        model: Arc<dyn ChatModel>,
        history: Arc<dyn SessionHistoryStore>,
    ) -> Self {
        Self {
            pipelines: PipelineBuilder::new(catalog, model, history),
        }
    }

    pub fn pipelines(&self) -> &PipelineBuilder {
        &self.pipelines
    }

    /// Analyze `text` within `session_id`, prefixed with the analysis prompt.
    pub async fn analyze_text(&self, session_id: Uuid, text: &str) -> Result<String> {
        let pipeline = self.pipelines.build(Purpose::TextAnalysis)?;
        let prefix = self
            .pipelines
            .catalog()
            .get_prompt(Purpose::TextAnalysis, PromptRole::Human)?;
        let question = format!("{}{}", prefix, text);

        let response = pipeline.invoke(session_id, &question).await?;
        info!(session_id = %session_id, chars = response.content.len(), "Text analyzed");
        Ok(response.content)
    }

    /// Ask a follow-up question in an existing session. The question is sent
    /// as-is.
    pub async fn follow_up_question(&self, session_id: Uuid, question: &str) -> Result<String> {
        let pipeline = self.pipelines.build(Purpose::FollowUp)?;
        let response = pipeline.invoke(session_id, question).await?;
        info!(session_id = %session_id, chars = response.content.len(), "Follow-up answered");
        Ok(response.content)
    }

    /// Generate a session title for `text`.
    ///
    /// Single-shot and history-free. Returns `None` when the model answers
    /// with nothing but whitespace. The title is trimmed and cut to
    /// [`MAX_TITLE_CHARS`].
    pub async fn generate_title(&self, text: &str) -> Result<Option<String>> {
        let catalog = self.pipelines.catalog();
        let system = catalog.get_prompt(Purpose::TitleGeneration, PromptRole::System)?;
        let prefix = catalog.get_prompt(Purpose::TitleGeneration, PromptRole::Human)?;

        let messages = [
            ChatMessage::system(system.as_ref()),
            ChatMessage::human(format!("{}{}", prefix, text)),
        ];
        let response = self.pipelines.model().invoke(&messages).await?;

        let title = response.content.trim();
        if title.is_empty() {
            debug!("Model returned an empty title");
            return Ok(None);
        }
        Ok(Some(title.chars().take(MAX_TITLE_CHARS).collect()))
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("provider", &self.pipelines.model().name())
            .finish_non_exhaustive()
    }
}
