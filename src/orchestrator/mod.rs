//! Run orchestrator.
//!
//! A run moves through `Starting → Streaming → Finalizing → Done`, ending
//! early as `Failed` (engine error or idle timeout) or `Cancelled` (client
//! went away). Each run executes on its own task and hands pre-framed SSE
//! events to the response body over a bounded channel.

use std::convert::Infallible;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::codec::{decode_input_messages, encode_chunk, encode_values};
use crate::engine::{EngineItem, GraphEngine, StreamedChunk};
use crate::error::GraphRunError;
use crate::sse::StreamEvent;
use crate::store::{RunPermit, ThreadStore};
use crate::types::{generate_id, Message};

/// Frames buffered between a run task and its response body.
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Input of one streaming run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub thread_id: String,
    pub input_messages: Vec<Value>,
}

impl RunRequest {
    pub fn new(thread_id: impl Into<String>, input_messages: Vec<Value>) -> Self {
        Self {
            thread_id: thread_id.into(),
            input_messages,
        }
    }

    /// Read `input.messages` from a request body. Anything missing or of the
    /// wrong shape yields an empty input list.
    pub fn from_body(thread_id: impl Into<String>, body: &Value) -> Self {
        let input_messages = body
            .get("input")
            .and_then(|input| input.get("messages"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self::new(thread_id, input_messages)
    }
}

/// How a run ended.
#[derive(Debug)]
enum RunOutcome {
    Completed { candidate: Option<Vec<Message>> },
    Failed(GraphRunError),
    Cancelled,
}

/// Starts runs against a graph engine and bridges their output to SSE.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<ThreadStore>,
    engine: Arc<dyn GraphEngine>,
    idle_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(store: Arc<ThreadStore>, engine: Arc<dyn GraphEngine>) -> Self {
        Self {
            store,
            engine,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }

    /// Maximum wait for the next engine item; `None` waits forever.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn store(&self) -> &Arc<ThreadStore> {
        &self.store
    }

    /// Spawn a run and return the handle that streams its frames.
    pub fn start(&self, request: RunRequest) -> RunHandle {
        let run_id = generate_id();
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = RunTask {
            run_id: run_id.clone(),
            thread_id: request.thread_id.clone(),
            inputs: request.input_messages,
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            idle_timeout: self.idle_timeout,
            tx,
            cancel: cancel.clone(),
        };
        let span = info_span!("run", run_id = %run_id, thread_id = %request.thread_id);
        tokio::spawn(task.execute().instrument(span));

        RunHandle {
            run_id,
            thread_id: request.thread_id,
            rx,
            cancel,
        }
    }
}

/// Handle for an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    thread_id: String,
    rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Value of the `Content-Location` response header.
    pub fn content_location(&self) -> String {
        format!("/threads/{}/runs/{}", self.thread_id, self.run_id)
    }

    /// Response body stream. Dropping it cancels the run.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let guard = self.cancel.drop_guard();
        let mut rx = self.rx;
        async_stream::stream! {
            let _guard = guard;
            while let Some(frame) = rx.recv().await {
                yield Ok::<Bytes, Infallible>(frame);
            }
        }
    }
}

struct RunTask {
    run_id: String,
    thread_id: String,
    inputs: Vec<Value>,
    store: Arc<ThreadStore>,
    engine: Arc<dyn GraphEngine>,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl RunTask {
    async fn execute(self) {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("client disconnected while queued");
                return;
            }
            permit = self.store.acquire_run(&self.thread_id) => permit,
        };
        info!(inputs = self.inputs.len(), "run started");

        let outcome = self.stream_engine(&permit).await;
        match outcome {
            RunOutcome::Completed { candidate } => {
                let committed = match candidate {
                    Some(messages) => {
                        let count = messages.len();
                        let values = encode_values(&messages);
                        self.store
                            .commit_snapshot(&self.thread_id, messages, values)
                            .map(|()| count)
                    }
                    None => self.store.touch(&self.thread_id).map(|()| 0),
                };
                drop(permit);
                match committed {
                    Ok(count) => {
                        info!(messages = count, "run completed");
                        let _ = self.emit(&StreamEvent::End).await;
                    }
                    Err(err) => self.fail(err).await,
                }
            }
            RunOutcome::Failed(err) => {
                drop(permit);
                self.fail(err).await;
            }
            RunOutcome::Cancelled => {
                drop(permit);
                info!("run cancelled; nothing committed");
            }
        }
    }

    async fn stream_engine(&self, permit: &RunPermit) -> RunOutcome {
        let mut context = permit.history();
        context.extend(decode_input_messages(&self.inputs));

        let metadata = StreamEvent::Metadata {
            run_id: self.run_id.clone(),
        };
        if let Err(outcome) = self.emit(&metadata).await {
            return outcome;
        }

        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RunOutcome::Cancelled,
            started = self.engine.run(context) => match started {
                Ok(stream) => stream,
                Err(err) => return RunOutcome::Failed(err),
            },
        };

        let mut candidate = None;
        let mut idle_sleep = self.idle_timeout.map(|timeout| Box::pin(time::sleep(timeout)));

        loop {
            // The deadline covers only the wait for the next item, not time
            // spent blocked on a slow client.
            if let (Some(sleep), Some(timeout)) = (idle_sleep.as_mut(), self.idle_timeout) {
                sleep.as_mut().reset(Instant::now() + timeout);
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RunOutcome::Cancelled,
                _ = idle(&mut idle_sleep) => {
                    let waited = self.idle_timeout.unwrap_or_default();
                    warn!(idle_ms = waited.as_millis() as u64, "engine stalled");
                    return RunOutcome::Failed(GraphRunError::Timeout(waited.as_millis() as u64));
                }
                item = stream.next() => {
                    let Some(item) = item else {
                        return RunOutcome::Completed { candidate };
                    };
                    match item {
                        Ok(EngineItem::Snapshot { messages }) => {
                            trace!(messages = messages.len(), "snapshot");
                            candidate = Some(messages);
                        }
                        Ok(EngineItem::Chunk { chunk: StreamedChunk::Ai(chunk), metadata }) => {
                            let event = StreamEvent::Messages {
                                chunk: encode_chunk(&chunk),
                                tags: metadata.tags,
                            };
                            if let Err(outcome) = self.emit(&event).await {
                                return outcome;
                            }
                        }
                        Ok(EngineItem::Chunk { chunk: StreamedChunk::Other(message), .. }) => {
                            trace!(role = %message.role(), "skipping non-ai chunk");
                        }
                        Err(err) => return RunOutcome::Failed(err),
                    }
                }
            }
        }
    }

    async fn emit(&self, event: &StreamEvent) -> Result<(), RunOutcome> {
        let frame = event
            .to_frame()
            .map_err(|err| RunOutcome::Failed(err.into()))?;
        self.tx.send(frame).await.map_err(|_| RunOutcome::Cancelled)
    }

    async fn fail(&self, err: GraphRunError) {
        warn!(error = %err, "run failed; nothing committed");
        let event = StreamEvent::Error {
            error: err.category().to_string(),
            message: err.to_string(),
        };
        let _ = self.emit(&event).await;
    }
}

async fn idle(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => pending::<()>().await,
    }
}
