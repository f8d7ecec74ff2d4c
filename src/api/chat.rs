//! Chat completions.

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::http::Client;

/// One chat message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Speaker role: `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Builds a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Builds a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Builds an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Parameters for a chat completion request.
///
/// The `stream` flag is not part of the public surface; the SDK sets it
/// according to which method is called.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier (e.g. `gpt-4o-mini`).
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling mass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Completion token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// End-user identifier for abuse tracking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatCompletionRequest {
    /// Builds a request from a model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.model.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("model"));
        }
        if self.messages.is_empty() {
            return Err(Error::MissingRequiredParameter("messages"));
        }
        Ok(())
    }
}

impl Client {
    /// Creates a chat completion and returns the full response.
    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Value, Error> {
        request.validate()?;
        self.create_json("/chat/completions", request).await
    }

    /// Creates a streamed chat completion.
    ///
    /// `on_event` receives each parsed chunk in server order; the call
    /// returns once the stream completes or fails.
    pub async fn create_chat_completion_stream<F>(
        &self,
        request: &ChatCompletionRequest,
        on_event: F,
    ) -> Result<(), Error>
    where
        F: FnMut(Value),
    {
        request.validate()?;
        let mut body = serde_json::to_value(request)?;
        body["stream"] = Value::Bool(true);
        self.create_json_streamed("/chat/completions", &body, on_event)
            .await
    }
}
