//! The delegation tool.

use crate::errors::LoomError;
use crate::subagent::{DelegationRequest, Delegator};
use crate::tools::{Tool, ToolInvocation, ToolResult};
use crate::vfs;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Generous budget: a child run makes many model calls of its own.
const DELEGATION_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Deserialize)]
struct TaskArgs {
    description: String,
    prompt: String,
    #[serde(default)]
    context_files: Vec<String>,
}

/// Hands a self-contained sub-task to an isolated child agent and returns
/// its final answer as the tool result.
pub struct TaskTool {
    delegator: Arc<Delegator>,
}

impl TaskTool {
    pub fn new(delegator: Arc<Delegator>) -> Self {
        Self { delegator }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained sub-task to a fresh agent. The sub-agent \
         sees only the prompt and the context_files you name, and returns a \
         single final answer. Requires an existing plan."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {"type": "string", "description": "Short label for what is being delegated"},
                "prompt": {"type": "string", "description": "Complete, self-contained instructions for the sub-agent"},
                "context_files": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Virtual-filesystem paths to copy into the sub-agent"
                }
            },
            "required": ["description", "prompt"]
        })
    }

    fn execution_timeout(&self) -> Option<Duration> {
        Some(DELEGATION_TIMEOUT)
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: TaskArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(ToolResult::error(format!("Invalid task arguments: {e}"))),
        };

        if invocation.state.plan_items.is_empty() {
            return Ok(ToolResult::error(LoomError::NoPlan.to_string()));
        }

        let mut context_files = BTreeMap::new();
        for path in &args.context_files {
            let key = vfs::normalize_path(path);
            match invocation.state.files.get(&key) {
                Some(content) => {
                    context_files.insert(key, content.clone());
                }
                None => {
                    return Ok(ToolResult::error(format!(
                        "Cannot share context file {key}: not found"
                    )));
                }
            }
        }

        let request = DelegationRequest {
            description: args.description,
            prompt: args.prompt,
            context_files,
            parent_depth: invocation.state.subagent_depth,
            call_id: invocation.call_id.to_string(),
        };
        match self
            .delegator
            .delegate(request, invocation.events, invocation.cancel)
            .await
        {
            Ok(answer) => Ok(ToolResult::ok(answer)),
            Err(e) => Ok(ToolResult::error(format!("Delegation failed: {e}"))),
        }
    }
}
