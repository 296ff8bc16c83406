//! Execution engine contract.
//!
//! An engine takes the run's message context and yields, over one stream,
//! either streamed message fragments (chunk mode) or full conversation
//! snapshots (snapshot mode), interleaved in the order it produces them.

pub mod agent;

pub use agent::AgentGraph;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GraphRunError;
use crate::types::{Message, MessageChunk};

/// Metadata describing the graph step that produced a chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepMetadata {
    pub tags: Vec<String>,
    pub node: Option<String>,
    pub step: u32,
}

/// A message fragment as streamed in chunk mode.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamedChunk {
    /// Fragment of an AI message; forwarded to the client.
    Ai(MessageChunk),
    /// Any other message kind streamed by a node (e.g. tool output).
    Other(Message),
}

/// One item yielded by an engine run.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineItem {
    Chunk {
        chunk: StreamedChunk,
        metadata: StepMetadata,
    },
    Snapshot {
        messages: Vec<Message>,
    },
}

impl EngineItem {
    pub fn ai_chunk(chunk: MessageChunk, metadata: StepMetadata) -> Self {
        Self::Chunk {
            chunk: StreamedChunk::Ai(chunk),
            metadata,
        }
    }

    pub fn snapshot(messages: Vec<Message>) -> Self {
        Self::Snapshot { messages }
    }
}

/// Stream of engine output for one run.
pub type EngineStream = BoxStream<'static, Result<EngineItem, GraphRunError>>;

/// Graph-execution engine driven by the run orchestrator.
///
/// Dropping the returned stream must abort the run.
#[async_trait]
pub trait GraphEngine: Send + Sync {
    async fn run(&self, context: Vec<Message>) -> Result<EngineStream, GraphRunError>;
}
