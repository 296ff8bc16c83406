//! Token usage reported on streamed chunks.

use serde::{Deserialize, Serialize};

/// Token usage attached to the final chunk of a model response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl UsageMetadata {
    /// Accumulate another usage record into this one.
    pub fn merge(&mut self, other: &UsageMetadata) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}
