//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::types::AgentToolParameters;
use crate::error::GraphRunError;

/// Core tool trait. Implement it to expose a function to the agent graph.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Execute the tool with the model-supplied arguments, returning the text
    /// placed in the tool message.
    async fn execute(&self, args: &Value) -> Result<String, GraphRunError>;
}

type ToolHandler =
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String, GraphRunError>> + Send>> + Send + Sync;

/// Closure-based tool for quick tool creation.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, GraphRunError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &Value) -> Result<String, GraphRunError> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Read a required string argument.
pub fn required_str<'a>(tool_name: &str, args: &'a Value, key: &str) -> Result<&'a str, GraphRunError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GraphRunError::ToolExecution {
            tool_name: tool_name.to_string(),
            message: format!("missing required string argument '{key}'"),
        })
}
