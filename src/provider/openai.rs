//! OpenAI Chat Completions streaming model.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::GraphRunError;
use crate::types::{Message, MessageKind, UsageMetadata};

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error, LineBuffer};
use super::{ChatDelta, ChatModel, ChatRequest, ChatStream, ToolCallDelta};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatModel {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiChatModel {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".into(), Value::Array(tool_defs));
            }
        }

        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, GraphRunError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, messages = request.messages.len(), "OpenAI stream_chat");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        Ok(delta_stream(resp.bytes_stream()))
    }
}

/// Turn a streamed completions body into deltas, stopping at `[DONE]`.
fn delta_stream<S>(byte_stream: S) -> ChatStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer = LineBuffer::default();
        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(GraphRunError::Network(e));
                    return;
                }
            };

            buffer.push(&chunk);

            while let Some(line) = buffer.next_line() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" {
                    return;
                }
                let Some(data) = parse_sse_data(&line) else {
                    continue;
                };
                match serde_json::from_str::<OpenAiStreamChunk>(data) {
                    Ok(chunk) => {
                        if let Some(delta) = convert_stream_chunk(chunk) {
                            yield Ok(delta);
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "skipping unparseable stream chunk");
                    }
                }
            }
        }
    };

    Box::pin(stream)
}

fn convert_stream_chunk(chunk: OpenAiStreamChunk) -> Option<ChatDelta> {
    let usage = chunk.usage.map(|u| UsageMetadata {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let Some(choice) = chunk.choices.into_iter().next() else {
        return usage.map(|usage| ChatDelta {
            usage: Some(usage),
            ..Default::default()
        });
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallDelta {
            index: tc.index,
            id: tc.id,
            name: tc.function.as_ref().and_then(|f| f.name.clone()),
            arguments: tc.function.and_then(|f| f.arguments),
        })
        .collect();

    Some(ChatDelta {
        text: choice.delta.content.unwrap_or_default(),
        tool_calls,
        usage,
        finish_reason: choice.finish_reason,
    })
}

fn message_to_openai(msg: &Message) -> Value {
    match &msg.kind {
        MessageKind::Human => json!({ "role": "user", "content": user_content(&msg.content) }),
        MessageKind::Ai { tool_calls } if !tool_calls.is_empty() => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.args.to_string(),
                        }
                    })
                })
                .collect();
            let text = msg.text();
            json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                "tool_calls": calls,
            })
        }
        MessageKind::Ai { .. } => json!({ "role": "assistant", "content": msg.text() }),
        MessageKind::Tool { tool_call_id } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": msg.text(),
        }),
    }
}

/// Plain strings go through as-is; structured parts are passed through so
/// image parts survive.
fn user_content(content: &Value) -> Value {
    match content {
        Value::Array(_) | Value::String(_) => content.clone(),
        other => Value::String(other.to_string()),
    }
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
