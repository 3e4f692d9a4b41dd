//! Stagnation detection.
//!
//! Watches the relationship between activity (turns, tool calls) and
//! progress (plan completions) and injects a corrective system message when
//! the run is spinning without advancing its plan. Holds no state of its
//! own; all counters live in [`RunMetrics`](crate::state::RunMetrics) so the
//! middleware can be rebuilt freely between runs.

use crate::events::{AgentEvent, EventSink};
use crate::middleware::AgentMiddleware;
use crate::provider::{Message, ToolCallRequest};
use crate::state::RunState;
use crate::tools::ToolResult;
use async_trait::async_trait;
use tracing::info;

pub struct ProgressMiddleware {
    turns_threshold: usize,
    tool_calls_threshold: usize,
    same_signature_threshold: usize,
}

impl ProgressMiddleware {
    pub fn new(
        turns_threshold: usize,
        tool_calls_threshold: usize,
        same_signature_threshold: usize,
    ) -> Self {
        Self {
            turns_threshold,
            tool_calls_threshold,
            same_signature_threshold,
        }
    }

    fn stalled(&self, state: &RunState) -> Option<&'static str> {
        let m = &state.metrics;
        if m.signature_repeats >= self.same_signature_threshold {
            Some("the same tool call is being repeated with identical arguments")
        } else if m.tool_calls_since_completion >= self.tool_calls_threshold {
            Some("many tool calls have run without a plan item completing")
        } else if m.no_progress_turns >= self.turns_threshold {
            Some("several turns have passed without a plan item completing")
        } else {
            None
        }
    }
}

#[async_trait]
impl AgentMiddleware for ProgressMiddleware {
    fn name(&self) -> &str {
        "progress"
    }

    async fn pre_call(&self, state: &mut RunState, _events: &EventSink) {
        if state.plan_items.is_empty() || state.plan_finished() {
            return;
        }
        let Some(reason) = self.stalled(state) else {
            return;
        };

        let completed = state.completed_items();
        let total = state.plan_items.len();
        info!(reason, completed, total, "injecting stagnation advisory");
        state.messages.push(Message::system(format!(
            "Progress check: {completed} of {total} plan items are complete and {reason}. \
             Either take a concretely different action toward the current in_progress item, \
             mark it completed via write_todos if it is actually done, or revise the plan to \
             reflect what you have learned."
        )));

        state.metrics.no_progress_turns = 0;
        state.metrics.tool_calls_since_completion = 0;
        state.metrics.signature_repeats = 0;
        state.metrics.stagnation_warnings += 1;
    }

    async fn post_tool(
        &self,
        call: &ToolCallRequest,
        _result: &mut ToolResult,
        state: &mut RunState,
        _events: &EventSink,
    ) {
        let signature = format!("{}:{}", call.name, call.arguments);
        let m = &mut state.metrics;
        if m.last_tool_signature.as_deref() == Some(signature.as_str()) {
            m.signature_repeats += 1;
        } else {
            m.last_tool_signature = Some(signature);
            m.signature_repeats = 1;
        }
        m.tool_calls_since_completion += 1;
    }

    async fn post_call(&self, state: &mut RunState, events: &EventSink) {
        if state.plan_items.is_empty() {
            return;
        }
        events.emit(AgentEvent::ProgressUpdate {
            completed: state.completed_items(),
            total: state.plan_items.len(),
        });
        if state.metrics.last_completion_iteration != Some(state.iteration) {
            state.metrics.no_progress_turns += 1;
        }
    }
}
