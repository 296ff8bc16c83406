//! Core types for graphrun.

pub mod message;
pub mod thread;
pub mod usage;

pub use message::*;
pub use thread::*;
pub use usage::*;

use uuid::Uuid;

/// Produce a fresh collision-resistant identifier for threads, runs and
/// unlabeled messages.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
