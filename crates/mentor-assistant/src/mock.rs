//! Scripted chat model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use mentor_core::types::ChatMessage;

use crate::error::{AssistantError, Result};
use crate::provider::{ChatModel, ModelResponse};

/// Mock chat model.
///
/// Replies from a script of queued responses, then falls back to a fixed
/// reply. Every call's messages are recorded for inspection.
#[derive(Debug)]
pub struct MockChatModel {
    reply: String,
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    failure: Mutex<Option<String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatModel {
    /// Create a mock that always answers "Mock response".
    pub fn new() -> Self {
        Self::with_reply("Mock response")
    }

    /// Create a mock that always answers `reply`.
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            script: Mutex::new(VecDeque::new()),
            failure: Mutex::new(None),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that answers with `responses` in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        if let Ok(mut script) = mock.script.lock() {
            script.extend(responses.into_iter().map(|r| Ok(r.into())));
        }
        mock
    }

    /// Create a mock whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        let mock = Self::new();
        mock.set_failure(Some(message));
        mock
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue one successful response.
    pub fn push_response(&self, content: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(content.to_string()));
        }
    }

    /// Queue one failed call.
    pub fn push_failure(&self, message: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.to_string()));
        }
    }

    /// Make every call fail (`Some`) or succeed again (`None`).
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = message.map(str::to_string);
        }
    }

    /// Messages passed to each call, oldest first.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ModelResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let forced = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(message) = forced {
            return Err(AssistantError::Provider(message));
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(content)) => Ok(ModelResponse { content }),
            Some(Err(message)) => Err(AssistantError::Provider(message)),
            None => Ok(ModelResponse::new(self.reply.clone())),
        }
    }
}
