//! Cross-cutting hooks that run around model calls and tool executions.
//!
//! Middleware observes and mutates [`RunState`] at four points in the loop:
//! before and after each model call, and before and after each tool
//! execution. `pre_tool` may short-circuit a tool by returning a result of
//! its own; the others mutate in place. Hooks never fail the run.

pub mod eviction;
pub mod progress;
pub mod summarize;

use crate::events::EventSink;
use crate::provider::ToolCallRequest;
use crate::state::RunState;
use crate::tools::ToolResult;
use async_trait::async_trait;
use std::sync::Arc;

pub use eviction::EvictionMiddleware;
pub use progress::ProgressMiddleware;
pub use summarize::SummarizeMiddleware;

/// One hook bundle. All hooks default to no-ops so implementors override
/// only the points they care about.
#[async_trait]
pub trait AgentMiddleware: Send + Sync {
    fn name(&self) -> &str;

    /// Runs before each model call, on the state the model is about to see.
    async fn pre_call(&self, _state: &mut RunState, _events: &EventSink) {}

    /// Runs after the model's response (and any tool results) have been
    /// appended to the conversation.
    async fn post_call(&self, _state: &mut RunState, _events: &EventSink) {}

    /// Runs before a tool executes. Returning `Some` suppresses the tool and
    /// uses the returned result in its place.
    async fn pre_tool(
        &self,
        _call: &ToolCallRequest,
        _state: &mut RunState,
        _events: &EventSink,
    ) -> Option<ToolResult> {
        None
    }

    /// Runs after a tool executes, with mutable access to its result.
    async fn post_tool(
        &self,
        _call: &ToolCallRequest,
        _result: &mut ToolResult,
        _state: &mut RunState,
        _events: &EventSink,
    ) {
    }
}

/// Ordered middleware chain. Every hook runs on every member in
/// registration order; for `pre_tool` the first short-circuit wins and the
/// remaining members are skipped.
pub struct MiddlewareStack {
    members: Vec<Arc<dyn AgentMiddleware>>,
}

impl MiddlewareStack {
    pub fn new(members: Vec<Arc<dyn AgentMiddleware>>) -> Self {
        Self { members }
    }

    pub async fn pre_call(&self, state: &mut RunState, events: &EventSink) {
        for m in &self.members {
            m.pre_call(state, events).await;
        }
    }

    pub async fn post_call(&self, state: &mut RunState, events: &EventSink) {
        for m in &self.members {
            m.post_call(state, events).await;
        }
    }

    pub async fn pre_tool(
        &self,
        call: &ToolCallRequest,
        state: &mut RunState,
        events: &EventSink,
    ) -> Option<ToolResult> {
        for m in &self.members {
            if let Some(result) = m.pre_tool(call, state, events).await {
                tracing::debug!(middleware = m.name(), tool = %call.name, "tool short-circuited");
                return Some(result);
            }
        }
        None
    }

    pub async fn post_tool(
        &self,
        call: &ToolCallRequest,
        result: &mut ToolResult,
        state: &mut RunState,
        events: &EventSink,
    ) {
        for m in &self.members {
            m.post_tool(call, result, state, events).await;
        }
    }
}
