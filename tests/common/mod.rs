//! Shared test helpers: scripted engines, a mock chat model and SSE parsing.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use graphrun::engine::{EngineItem, EngineStream, GraphEngine, StepMetadata, StreamedChunk};
use graphrun::error::GraphRunError;
use graphrun::orchestrator::{Orchestrator, RunHandle};
use graphrun::provider::{ChatDelta, ChatModel, ChatRequest, ChatStream};
use graphrun::store::ThreadStore;
use graphrun::types::{Message, MessageChunk};

/// Reply the scripted engine gives to `input`.
pub fn scripted_reply(input: &str) -> String {
    if input == "hi" {
        "hello".to_string()
    } else {
        format!("echo: {input}")
    }
}

/// Engine that answers the last message with [`scripted_reply`], streaming
/// the reply in three-character chunks and yielding snapshots before and
/// after.
pub struct ScriptedEngine {
    tags: Vec<String>,
    emit_snapshots: bool,
    emit_tool_noise: bool,
    runs: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            tags: vec!["scripted".to_string()],
            emit_snapshots: true,
            emit_tool_noise: false,
            runs: AtomicUsize::new(0),
        }
    }

    /// Stream chunks only, never a snapshot.
    pub fn without_snapshots(mut self) -> Self {
        self.emit_snapshots = false;
        self
    }

    /// Also stream a tool message chunk, which must not reach the client.
    pub fn with_tool_noise(mut self) -> Self {
        self.emit_tool_noise = true;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphEngine for ScriptedEngine {
    async fn run(&self, context: Vec<Message>) -> Result<EngineStream, GraphRunError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let reply = scripted_reply(&context.last().map(Message::text).unwrap_or_default());
        let ai = Message::ai(reply.clone()).with_id(format!("run-{}", context.len()));
        let metadata = StepMetadata {
            tags: self.tags.clone(),
            node: Some("agent".to_string()),
            step: 1,
        };

        let mut items = Vec::new();
        if self.emit_snapshots {
            items.push(Ok(EngineItem::snapshot(context.clone())));
        }
        if self.emit_tool_noise {
            items.push(Ok(EngineItem::Chunk {
                chunk: StreamedChunk::Other(Message::tool("call_0", "noise")),
                metadata: metadata.clone(),
            }));
        }
        let chars: Vec<char> = reply.chars().collect();
        for part in chars.chunks(3) {
            let text: String = part.iter().collect();
            items.push(Ok(EngineItem::ai_chunk(
                MessageChunk::text(ai.id.clone(), text),
                metadata.clone(),
            )));
        }
        if self.emit_snapshots {
            let mut after = context;
            after.push(ai);
            items.push(Ok(EngineItem::snapshot(after)));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Engine that streams one chunk and then fails.
pub struct FailingEngine;

#[async_trait]
impl GraphEngine for FailingEngine {
    async fn run(&self, context: Vec<Message>) -> Result<EngineStream, GraphRunError> {
        let items = vec![
            Ok(EngineItem::snapshot(context)),
            Ok(EngineItem::ai_chunk(
                MessageChunk::text("run-fail", "partial"),
                StepMetadata::default(),
            )),
            Err(GraphRunError::Engine("model exploded".to_string())),
        ];
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Sets a flag when dropped.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Engine that yields one snapshot and then never produces anything else.
#[derive(Default)]
pub struct StallingEngine {
    pub dropped: Arc<AtomicBool>,
}

#[async_trait]
impl GraphEngine for StallingEngine {
    async fn run(&self, context: Vec<Message>) -> Result<EngineStream, GraphRunError> {
        let flag = DropFlag(Arc::clone(&self.dropped));
        let stream = async_stream::stream! {
            let _flag = flag;
            yield Ok(EngineItem::snapshot(context));
            futures::future::pending::<()>().await;
        };
        Ok(Box::pin(stream))
    }
}

/// Chat model that replays queued delta scripts, one per call.
#[derive(Default)]
pub struct MockChatModel {
    scripts: Mutex<Vec<Vec<ChatDelta>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply split into the given pieces.
    pub fn queue_text(&self, pieces: &[&str]) {
        let deltas = pieces.iter().map(|p| ChatDelta::text(*p)).collect();
        self.scripts.lock().unwrap().push(deltas);
    }

    pub fn queue_deltas(&self, deltas: Vec<ChatDelta>) {
        self.scripts.lock().unwrap().push(deltas);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChatStream, GraphRunError> {
        self.requests.lock().unwrap().push(request.clone());
        let deltas = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![ChatDelta::text("Mock response")]
            } else {
                scripts.remove(0)
            }
        };
        Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok))))
    }
}

/// Orchestrator over a fresh store.
pub fn orchestrator_with(engine: impl GraphEngine + 'static) -> (Orchestrator, Arc<ThreadStore>) {
    let store = Arc::new(ThreadStore::new());
    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::new(engine));
    (orchestrator, store)
}

/// A client-side human input message.
pub fn human(text: &str) -> Value {
    json!({ "type": "human", "content": text })
}

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.data).unwrap()
    }
}

/// Split a complete SSE body into events.
pub fn parse_sse(body: &str) -> Vec<SseEvent> {
    body.split("\n\n")
        .filter(|block| !block.is_empty())
        .map(|block| {
            let mut event = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = rest.to_string();
                } else if line == "data:" {
                    data.clear();
                }
            }
            SseEvent { event, data }
        })
        .collect()
}

/// Drain a run to completion and return its raw body.
pub async fn read_body(handle: RunHandle) -> String {
    let frames: Vec<_> = handle.into_body_stream().collect().await;
    frames
        .into_iter()
        .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
        .collect()
}

/// Drain a run to completion and return its events.
pub async fn read_events(handle: RunHandle) -> Vec<SseEvent> {
    parse_sse(&read_body(handle).await)
}

pub fn event_names(events: &[SseEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event.as_str()).collect()
}
