//! Tool-calling agent graph: an `agent` node that streams a chat completion,
//! and a `tools` node that answers its tool calls, looping until the model
//! replies without tool calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{EngineItem, EngineStream, GraphEngine, StepMetadata, StreamedChunk};
use crate::config::ServerConfig;
use crate::error::{GraphRunError, Result};
use crate::provider::{ChatDelta, ChatModel, ChatRequest, OpenAiChatModel, ToolDefinition};
use crate::tools::builtin::all_tools;
use crate::tools::Tool;
use crate::types::{generate_id, Message, MessageChunk, ToolCall, ToolCallChunk, UsageMetadata};

/// Steps allowed before a run fails with [`GraphRunError::RecursionLimit`].
pub const DEFAULT_MAX_STEPS: usize = 25;

const AGENT_NODE: &str = "agent";
const TOOLS_NODE: &str = "tools";

#[derive(Clone)]
pub struct AgentGraph {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    tags: Vec<String>,
    max_steps: usize,
}

impl AgentGraph {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            model,
            tools,
            tags: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Tags attached to every streamed chunk.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// OpenAI-backed graph with the built-in tools bound.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            GraphRunError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;
        let model = OpenAiChatModel::new(config.model.clone(), api_key, config.openai_base_url.clone());
        Ok(Self::new(Arc::new(model), all_tools()))
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().schema.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl GraphEngine for AgentGraph {
    async fn run(&self, context: Vec<Message>) -> Result<EngineStream> {
        let model = Arc::clone(&self.model);
        let tools = self.tools.clone();
        let tags = self.tags.clone();
        let max_steps = self.max_steps;
        let tool_defs = self.tool_definitions();

        let stream = async_stream::stream! {
            let mut messages = context;
            yield Ok(EngineItem::snapshot(messages.clone()));

            let mut step: u32 = 0;
            for _ in 0..max_steps {
                step += 1;
                let request = ChatRequest {
                    messages: messages.clone(),
                    tools: tool_defs.clone(),
                };
                let mut deltas = match model.stream_chat(&request).await {
                    Ok(deltas) => deltas,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };

                let metadata = StepMetadata {
                    tags: tags.clone(),
                    node: Some(AGENT_NODE.to_string()),
                    step,
                };
                let mut acc = AiMessageAccumulator::new(format!("run-{}", generate_id()));
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(delta) => {
                            let chunk = acc.push(delta);
                            yield Ok(EngineItem::ai_chunk(chunk, metadata.clone()));
                        }
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }

                let ai = acc.finish();
                let calls = ai.tool_calls().to_vec();
                debug!(step, tool_calls = calls.len(), "agent step complete");
                messages.push(ai);
                yield Ok(EngineItem::snapshot(messages.clone()));

                if calls.is_empty() {
                    return;
                }

                step += 1;
                let metadata = StepMetadata {
                    tags: tags.clone(),
                    node: Some(TOOLS_NODE.to_string()),
                    step,
                };
                for call in calls {
                    let result = execute_tool_call(&tools, &call).await;
                    messages.push(result.clone());
                    yield Ok(EngineItem::Chunk {
                        chunk: StreamedChunk::Other(result),
                        metadata: metadata.clone(),
                    });
                }
                yield Ok(EngineItem::snapshot(messages.clone()));
            }

            warn!(max_steps, "agent graph hit its step limit");
            yield Err(GraphRunError::RecursionLimit(max_steps));
        };

        Ok(Box::pin(stream))
    }
}

async fn execute_tool_call(tools: &[Arc<dyn Tool>], call: &ToolCall) -> Message {
    let content = match tools.iter().find(|tool| tool.name() == call.name) {
        Some(tool) => match tool.execute(&call.args).await {
            Ok(output) => output,
            Err(err) => {
                debug!(tool = %call.name, error = %err, "tool call failed");
                format!("Error: {err}\n Please fix your mistakes.")
            }
        },
        None => {
            let names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
            format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                names.join(", ")
            )
        }
    };
    Message::tool(call.id.clone(), content)
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds streamed deltas into the final AI message while producing the
/// per-delta chunks.
struct AiMessageAccumulator {
    id: String,
    text: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    usage: Option<UsageMetadata>,
    finish_reason: Option<String>,
}

impl AiMessageAccumulator {
    fn new(id: String) -> Self {
        Self {
            id,
            text: String::new(),
            tool_calls: BTreeMap::new(),
            usage: None,
            finish_reason: None,
        }
    }

    fn push(&mut self, delta: ChatDelta) -> MessageChunk {
        self.text.push_str(&delta.text);

        let mut tool_call_chunks = Vec::with_capacity(delta.tool_calls.len());
        for tc in delta.tool_calls {
            let entry = self.tool_calls.entry(tc.index).or_default();
            if let Some(id) = &tc.id {
                entry.id = Some(id.clone());
            }
            if let Some(name) = &tc.name {
                entry.name.push_str(name);
            }
            if let Some(arguments) = &tc.arguments {
                entry.arguments.push_str(arguments);
            }
            tool_call_chunks.push(ToolCallChunk {
                name: tc.name,
                args: tc.arguments,
                id: tc.id,
                index: Some(tc.index),
            });
        }

        if let Some(usage) = &delta.usage {
            match &mut self.usage {
                Some(total) => total.merge(usage),
                None => self.usage = Some(*usage),
            }
        }

        let mut response_metadata = Map::new();
        if let Some(reason) = &delta.finish_reason {
            self.finish_reason = Some(reason.clone());
            response_metadata.insert("finish_reason".into(), Value::String(reason.clone()));
        }

        MessageChunk {
            id: self.id.clone(),
            content: Value::String(delta.text),
            tool_call_chunks,
            usage_metadata: delta.usage,
            additional_kwargs: Map::new(),
            response_metadata,
        }
    }

    fn finish(self) -> Message {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|partial| ToolCall {
                id: partial.id.unwrap_or_else(|| format!("call_{}", generate_id())),
                args: parse_arguments(&partial.name, &partial.arguments),
                name: partial.name,
            })
            .collect();

        let mut message = Message::ai_with_tool_calls(self.text, tool_calls).with_id(self.id);
        if let Some(reason) = self.finish_reason {
            message
                .response_metadata
                .insert("finish_reason".into(), Value::String(reason));
        }
        if let Some(usage) = self.usage {
            message.response_metadata.insert(
                "token_usage".into(),
                json!({
                    "prompt_tokens": usage.input_tokens,
                    "completion_tokens": usage.output_tokens,
                    "total_tokens": usage.total_tokens,
                }),
            );
        }
        message
    }
}

fn parse_arguments(tool_name: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(tool = tool_name, error = %err, "tool call arguments are not valid JSON");
        Value::Object(Map::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolCallDelta;

    #[test]
    fn accumulator_assembles_tool_calls_by_index() {
        let mut acc = AiMessageAccumulator::new("run-1".into());
        acc.push(ChatDelta {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some("call_a".into()),
                name: Some("calculate".into()),
                arguments: Some("{\"expr".into()),
            }],
            ..Default::default()
        });
        let chunk = acc.push(ChatDelta {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                arguments: Some("ession\": \"1+1\"}".into()),
                ..Default::default()
            }],
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        });
        assert_eq!(chunk.id, "run-1");
        assert_eq!(chunk.tool_call_chunks[0].index, Some(0));

        let message = acc.finish();
        assert_eq!(message.id, "run-1");
        assert_eq!(
            message.tool_calls(),
            &[ToolCall {
                id: "call_a".into(),
                name: "calculate".into(),
                args: json!({"expression": "1+1"}),
            }]
        );
        assert_eq!(message.response_metadata["finish_reason"], json!("tool_calls"));
    }

    #[test]
    fn invalid_arguments_fall_back_to_empty_object() {
        assert_eq!(parse_arguments("calculate", "{not json"), json!({}));
        assert_eq!(parse_arguments("calculate", ""), json!({}));
    }
}
