//! In-memory thread registry.
//!
//! Each thread lives in its own entry holding a short-lived state mutex and a
//! per-thread async run lock. The registry map is only locked for lookups and
//! inserts, so runs on different threads never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::{Map, Value};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::error::{GraphRunError, Result};
use crate::types::{generate_id, Message, Thread, ThreadStatus};

struct ThreadEntry {
    thread: Mutex<Thread>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ThreadEntry {
    fn new(thread: Thread) -> Self {
        Self {
            thread: Mutex::new(thread),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Thread> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared, lock-guarded registry of conversation threads.
#[derive(Default)]
pub struct ThreadStore {
    entries: RwLock<HashMap<String, Arc<ThreadEntry>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or overwrite) a thread.
    ///
    /// A missing id gets a freshly generated one. Overwriting an existing id
    /// resets its state but keeps its run lock and status, so an in-flight
    /// run stays serialized against later ones and the thread stays busy.
    pub fn create_thread(&self, thread_id: Option<String>, metadata: Option<Map<String, Value>>) -> Thread {
        let thread_id = thread_id.unwrap_or_else(generate_id);
        let mut thread = Thread::new(thread_id.clone(), metadata.unwrap_or_default());

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&thread_id) {
            Some(entry) => {
                debug!(thread_id = %thread_id, "overwriting existing thread");
                let mut current = entry.lock();
                thread.status = current.status;
                *current = thread.clone();
            }
            None => {
                entries.insert(thread_id, Arc::new(ThreadEntry::new(thread.clone())));
            }
        }
        thread
    }

    pub fn get_thread(&self, thread_id: &str) -> Option<Thread> {
        self.entry(thread_id).map(|entry| entry.lock().clone())
    }

    /// Return the thread, creating an empty one with no metadata if unknown.
    pub fn get_or_create(&self, thread_id: &str) -> Thread {
        self.entry_or_create(thread_id).lock().clone()
    }

    /// Replace the message history and encoded values, advancing `updated_at`.
    pub fn commit_snapshot(&self, thread_id: &str, history: Vec<Message>, values: Value) -> Result<()> {
        let entry = self.require(thread_id)?;
        let mut thread = entry.lock();
        thread.message_history = history;
        thread.values = values;
        thread.touch();
        Ok(())
    }

    /// Advance `updated_at` without changing history.
    pub fn touch(&self, thread_id: &str) -> Result<()> {
        self.require(thread_id)?.lock().touch();
        Ok(())
    }

    /// Wait for exclusive run access to a thread, creating it if unknown.
    ///
    /// Runs on the same thread queue here in arrival order. The thread is
    /// marked busy while the returned permit is held and idle once it drops.
    pub async fn acquire_run(&self, thread_id: &str) -> RunPermit {
        let entry = self.entry_or_create(thread_id);
        let guard = Arc::clone(&entry.run_lock).lock_owned().await;
        entry.lock().status = ThreadStatus::Busy;
        RunPermit {
            entry,
            _guard: guard,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, thread_id: &str) -> Option<Arc<ThreadEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    fn require(&self, thread_id: &str) -> Result<Arc<ThreadEntry>> {
        self.entry(thread_id)
            .ok_or_else(|| GraphRunError::InvalidState(format!("thread {thread_id} not found")))
    }

    fn entry_or_create(&self, thread_id: &str) -> Arc<ThreadEntry> {
        if let Some(entry) = self.entry(thread_id) {
            return entry;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(thread_id.to_string()).or_insert_with(|| {
            debug!(thread_id, "creating thread on first use");
            Arc::new(ThreadEntry::new(Thread::new(thread_id, Map::new())))
        }))
    }
}

/// Exclusive right to run on one thread.
pub struct RunPermit {
    entry: Arc<ThreadEntry>,
    _guard: OwnedMutexGuard<()>,
}

impl RunPermit {
    /// Message history as of now.
    pub fn history(&self) -> Vec<Message> {
        self.entry.lock().message_history.clone()
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.entry.lock().status = ThreadStatus::Idle;
    }
}
