//! Mapping between LangGraph wire messages and internal [`Message`] values.
//!
//! Encoded objects follow the shape the `@langchain/langgraph-sdk` client
//! reads: complete messages are tagged `human`, `ai` or `tool`; streamed
//! fragments are tagged `AIMessageChunk`.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::types::{generate_id, Message, MessageChunk, MessageKind, Role, ToolCallChunk};

/// Type marker that distinguishes streamed fragments from complete messages.
pub const CHUNK_TYPE: &str = "AIMessageChunk";

/// Encode a complete message into its tagged wire object.
pub fn encode_message(message: &Message) -> Value {
    let mut obj = Map::new();
    obj.insert("content".into(), message.content.clone());
    obj.insert(
        "additional_kwargs".into(),
        Value::Object(message.additional_kwargs.clone()),
    );
    obj.insert(
        "response_metadata".into(),
        Value::Object(message.response_metadata.clone()),
    );
    obj.insert("id".into(), Value::String(message.id.clone()));
    obj.insert("type".into(), Value::String(message.role().to_string()));

    match &message.kind {
        MessageKind::Human => {}
        MessageKind::Ai { tool_calls } => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "name": call.name,
                        "args": call.args,
                        "type": "tool_call",
                    })
                })
                .collect();
            obj.insert("tool_calls".into(), Value::Array(calls));
            obj.insert("invalid_tool_calls".into(), Value::Array(Vec::new()));
        }
        MessageKind::Tool { tool_call_id } => {
            obj.insert("tool_call_id".into(), Value::String(tool_call_id.clone()));
        }
    }

    Value::Object(obj)
}

/// Encode a streamed AI fragment.
pub fn encode_chunk(chunk: &MessageChunk) -> Value {
    let tool_call_chunks: Vec<Value> = chunk.tool_call_chunks.iter().map(encode_tool_call_chunk).collect();
    let usage = chunk
        .usage_metadata
        .map(|usage| {
            json!({
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "total_tokens": usage.total_tokens,
            })
        })
        .unwrap_or(Value::Null);

    json!({
        "content": chunk.content,
        "additional_kwargs": chunk.additional_kwargs,
        "response_metadata": chunk.response_metadata,
        "type": CHUNK_TYPE,
        "name": null,
        "id": chunk.id,
        "tool_calls": [],
        "invalid_tool_calls": [],
        "usage_metadata": usage,
        "tool_call_chunks": tool_call_chunks,
    })
}

fn encode_tool_call_chunk(chunk: &ToolCallChunk) -> Value {
    json!({
        "name": chunk.name.as_deref().unwrap_or_default(),
        "args": chunk.args.as_deref().unwrap_or_default(),
        "id": chunk.id.as_deref().unwrap_or_default(),
        "index": chunk.index.unwrap_or(0),
        "type": "tool_call_chunk",
    })
}

/// Encode a full history as the thread `values` object.
pub fn encode_values(messages: &[Message]) -> Value {
    let encoded: Vec<Value> = messages.iter().map(encode_message).collect();
    json!({ "messages": encoded })
}

/// Decode client-supplied input messages, one internal message per entry.
pub fn decode_input_messages(messages: &[Value]) -> Vec<Message> {
    messages.iter().map(decode_input_message).collect()
}

fn decode_input_message(raw: &Value) -> Message {
    let role = resolve_role(role_tag(raw));
    let content = match raw.get("content") {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(content) => content.clone(),
    };
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(generate_id);

    let message = match role {
        Role::Human => Message::human(content),
        Role::Ai => Message::ai(content),
        Role::Tool => {
            let tool_call_id = raw
                .get("tool_call_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Message::tool(tool_call_id, content)
        }
    };
    message.with_id(id)
}

/// `type` wins over `role`; an empty `type` falls through to `role`.
fn role_tag(raw: &Value) -> Option<&str> {
    let non_empty = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
    };
    non_empty("type").or_else(|| non_empty("role"))
}

fn resolve_role(tag: Option<&str>) -> Role {
    match tag {
        Some("human" | "user") => Role::Human,
        Some("ai" | "assistant") => Role::Ai,
        Some("tool") => Role::Tool,
        Some(other) => {
            debug!(role = other, "unrecognized message role, decoding as human");
            Role::Human
        }
        None => Role::Human,
    }
}
