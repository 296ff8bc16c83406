//! Thread (conversation) state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use super::message::Message;

/// Whether a run is currently in flight on a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Idle,
    Busy,
}

/// A conversation's durable state.
///
/// Serializes to the thread object returned by `POST /threads`. The internal
/// message history is not part of the wire shape; `values` is its encoded
/// cache.
#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
    pub status: ThreadStatus,
    pub values: Value,
    pub interrupts: Map<String, Value>,
    #[serde(skip)]
    pub message_history: Vec<Message>,
}

impl Thread {
    /// Create an empty idle thread.
    pub fn new(thread_id: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            created_at: now,
            updated_at: now,
            metadata,
            status: ThreadStatus::Idle,
            values: Value::Object(Map::new()),
            interrupts: Map::new(),
            message_history: Vec::new(),
        }
    }

    /// Advance `updated_at` to now, never moving it backwards.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}
