//! Tool abstraction and registry.
//!
//! Tools are the only way the model acts on the run: each one takes JSON
//! arguments and a mutable view of the run, and produces a textual result.
//! Tool failures are payloads, not run failures: the registry converts
//! every failure mode (unknown tool, malformed arguments, execution error,
//! timeout) into an error-flagged [`ToolResult`] that goes back to the model.

pub mod fs;
pub mod plan;
pub mod task;

use crate::events::EventSink;
use crate::provider::{ToolCallRequest, ToolDefinition};
use crate::state::RunState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use fs::{ListFilesTool, ReadFileTool, SearchFilesTool, WriteFileTool};
pub use plan::WriteTodosTool;
pub use task::TaskTool;

/// Outcome of one tool execution, fed back to the model as a tool message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Everything a tool may touch during one invocation. Borrowed for the
/// duration of the call; tools never retain state across invocations.
pub struct ToolInvocation<'a> {
    pub state: &'a mut RunState,
    pub events: &'a EventSink,
    pub call_id: &'a str,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// Per-tool execution budget. `None` uses the registry default.
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult>;

    fn to_schema(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Name-indexed tool set for one run.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    default_timeout: Duration,
}

impl ToolRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            default_timeout,
        }
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Schemas in registration order, for the model's tool list.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.to_schema())
            .collect()
    }

    /// Execute one model-requested call. Infallible by construction: every
    /// failure becomes an error result the model can react to.
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        state: &mut RunState,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return ToolResult::error(format!("Unknown tool: {}", call.name));
        };

        if !call.arguments.is_object() {
            return ToolResult::error(format!(
                "Invalid arguments for {}: expected a JSON object",
                call.name
            ));
        }

        debug!(tool = %call.name, call_id = %call.id, "executing tool");
        let timeout = tool.execution_timeout().unwrap_or(self.default_timeout);
        let mut invocation = ToolInvocation {
            state,
            events,
            call_id: &call.id,
            cancel,
        };
        match tokio::time::timeout(timeout, tool.execute(call.arguments.clone(), &mut invocation))
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                ToolResult::error(format!("Tool {} failed: {e}", call.name))
            }
            Err(_) => ToolResult::error(format!(
                "Tool {} timed out after {:?}",
                call.name, timeout
            )),
        }
    }
}
