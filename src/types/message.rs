//! Conversation message types exchanged with the execution engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use super::generate_id;
use super::usage::UsageMetadata;

/// Message variant discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    Tool,
}

/// A tool invocation requested by an AI message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Variant-specific message data.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Human,
    Ai { tool_calls: Vec<ToolCall> },
    Tool { tool_call_id: String },
}

/// A complete conversation message.
///
/// The `id` is fixed when the value is built, so re-encoding the same message
/// always yields the same identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: Value,
    pub additional_kwargs: Map<String, Value>,
    pub response_metadata: Map<String, Value>,
    pub kind: MessageKind,
}

impl Message {
    fn with_kind(content: impl Into<Value>, kind: MessageKind) -> Self {
        Self {
            id: generate_id(),
            content: content.into(),
            additional_kwargs: Map::new(),
            response_metadata: Map::new(),
            kind,
        }
    }

    /// Create a human message.
    pub fn human(content: impl Into<Value>) -> Self {
        Self::with_kind(content, MessageKind::Human)
    }

    /// Create an AI message without tool calls.
    pub fn ai(content: impl Into<Value>) -> Self {
        Self::with_kind(content, MessageKind::Ai { tool_calls: Vec::new() })
    }

    /// Create an AI message that requests tool calls.
    pub fn ai_with_tool_calls(content: impl Into<Value>, tool_calls: Vec<ToolCall>) -> Self {
        Self::with_kind(content, MessageKind::Ai { tool_calls })
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<Value>) -> Self {
        Self::with_kind(
            content,
            MessageKind::Tool {
                tool_call_id: tool_call_id.into(),
            },
        )
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn role(&self) -> Role {
        match self.kind {
            MessageKind::Human => Role::Human,
            MessageKind::Ai { .. } => Role::Ai,
            MessageKind::Tool { .. } => Role::Tool,
        }
    }

    /// Extract the text content.
    ///
    /// Structured content contributes its `text` parts, concatenated.
    pub fn text(&self) -> String {
        content_text(&self.content)
    }

    /// Tool calls carried by an AI message (empty for other variants).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.kind {
            MessageKind::Ai { tool_calls } => tool_calls,
            _ => &[],
        }
    }
}

/// Incremental fragment of a tool call inside a [`MessageChunk`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub name: Option<String>,
    pub args: Option<String>,
    pub id: Option<String>,
    pub index: Option<u32>,
}

/// Incremental fragment of an in-progress AI message.
///
/// Chunks sharing an `id` belong to the same logical message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    pub id: String,
    pub content: Value,
    pub tool_call_chunks: Vec<ToolCallChunk>,
    pub usage_metadata: Option<UsageMetadata>,
    pub additional_kwargs: Map<String, Value>,
    pub response_metadata: Map<String, Value>,
}

impl MessageChunk {
    /// Create a text-only chunk for message `id`.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Value::String(text.into()),
            tool_call_chunks: Vec::new(),
            usage_metadata: None,
            additional_kwargs: Map::new(),
            response_metadata: Map::new(),
        }
    }
}

fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
