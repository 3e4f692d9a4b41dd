//! The planning tool.

use crate::events::AgentEvent;
use crate::plan::{self, PlanItemInput};
use crate::tools::{Tool, ToolInvocation, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
struct WriteTodosArgs {
    todos: Vec<PlanItemInput>,
}

/// Replaces the run's plan wholesale. Rejected updates (integrity
/// violations, empty first plan) come back as error results so the model can
/// correct itself; the existing plan is untouched.
pub struct WriteTodosTool;

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        "Record or update your task plan. Pass the complete list every time; \
         it replaces the previous plan. Keep at most one item in_progress, \
         and never change or reopen a completed item."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": {"type": "string", "description": "Imperative step description"},
                            "activeForm": {"type": "string", "description": "Present-continuous form shown while active"},
                            "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                            "id": {"type": "string", "description": "Id of an existing item being carried forward"}
                        },
                        "required": ["content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: WriteTodosArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(ToolResult::error(format!("Invalid todos payload: {e}"))),
        };

        match plan::replace_plan(invocation.state, args.todos) {
            Ok(summary) => {
                invocation.events.emit(AgentEvent::PlanChanged {
                    items: invocation.state.plan_items.clone(),
                });
                Ok(ToolResult::ok(summary))
            }
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
