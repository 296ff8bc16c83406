//! Tools available to the built-in agent graph.

pub mod builtin;
pub mod calculator;
pub mod tool;
pub mod types;

pub use tool::{AgentTool, Tool};
pub use types::AgentToolParameters;
