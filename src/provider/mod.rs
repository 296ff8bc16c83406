//! Chat model trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

pub use openai::OpenAiChatModel;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::GraphRunError;
use crate::types::{Message, UsageMetadata};

/// Tool definition sent to the model API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A request sent to a chat model.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Incremental fragment of a tool call as reported by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// A delta emitted while a chat completion streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatDelta {
    pub text: String,
    pub tool_calls: Vec<ToolCallDelta>,
    pub usage: Option<UsageMetadata>,
    pub finish_reason: Option<String>,
}

impl ChatDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

pub type ChatStream = BoxStream<'static, Result<ChatDelta, GraphRunError>>;

/// Core trait implemented by chat model backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model ID this instance serves.
    fn model_id(&self) -> &str;

    /// Stream a completion for `request`.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, GraphRunError>;
}
