//! Mentor assistant crate - the conversation orchestration engine.
//!
//! Loads prompt templates, resolves the configured chat model, composes
//! history-aware pipelines per purpose and exposes the [`Assistant`]
//! operations: text analysis, follow-up questions and title generation.

pub mod assistant;
pub mod error;
pub mod mock;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod together;

pub use assistant::{Assistant, MAX_TITLE_CHARS};
pub use error::AssistantError;
pub use mock::MockChatModel;
pub use pipeline::{ConversationPipeline, PipelineBuilder, PromptTemplate};
pub use prompts::{PromptCatalog, PromptRole, Purpose};
pub use provider::{build_provider, ChatModel, ModelResponse};
pub use together::TogetherAiModel;
