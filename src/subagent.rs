//! Delegated child runs.
//!
//! A delegation spins up a complete, isolated agent run: fresh state, fresh
//! middleware, its own (smaller) iteration budget. The parent sees only the
//! child's final answer as a tool result; the child sees only the prompt and
//! the explicitly shared context files.

use crate::agent_loop::{AgentLoop, RunOutcome};
use crate::config::RunConfig;
use crate::errors::{LoomError, LoomResult};
use crate::events::{AgentEvent, EventSink};
use crate::provider::LLMProvider;
use crate::state::RunState;
use crate::tools::Tool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One delegation, as assembled by the `task` tool.
pub struct DelegationRequest {
    pub description: String,
    pub prompt: String,
    /// Files copied by value into the child's otherwise-empty filesystem.
    pub context_files: BTreeMap<String, String>,
    pub parent_depth: usize,
    /// Tool-call id of the originating `task` call, used to correlate
    /// subagent events.
    pub call_id: String,
}

/// Runs child agents on behalf of the `task` tool.
pub struct Delegator {
    provider: Arc<dyn LLMProvider>,
    config: RunConfig,
    instruction: Option<String>,
    extra_tools: Vec<Arc<dyn Tool>>,
}

impl Delegator {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        config: RunConfig,
        instruction: Option<String>,
        extra_tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            provider,
            config,
            instruction,
            extra_tools,
        }
    }

    /// Run one child to completion and return its final answer.
    ///
    /// The child gets a child cancellation token, so cancelling the parent
    /// cancels every descendant, and a disabled event sink: only the
    /// `SubagentStarted`/`SubagentFinished` markers emitted here reach the
    /// parent's stream.
    pub async fn delegate(
        &self,
        request: DelegationRequest,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> LoomResult<String> {
        let depth = request.parent_depth + 1;
        if depth > self.config.max_subagent_depth {
            return Err(LoomError::DepthExceeded {
                depth,
                max: self.config.max_subagent_depth,
            });
        }

        info!(depth, description = %request.description, "delegating sub-task");
        events.emit(AgentEvent::SubagentStarted {
            call_id: request.call_id.clone(),
            description: request.description.clone(),
            depth,
        });

        let mut child_config = self.config.clone();
        child_config.max_iterations = self.config.max_iterations_per_subagent;

        let mut child = AgentLoop::new(self.provider.clone(), child_config);
        for tool in &self.extra_tools {
            child = child.with_tool(tool.clone());
        }

        // The instruction lands in the child state directly; run_state
        // consumes the state as-is.
        let mut state = RunState::child(
            depth,
            self.instruction.as_deref(),
            &request.prompt,
            request.context_files,
        );
        let outcome = child
            .run_state(&mut state, &EventSink::disabled(), &cancel.child_token())
            .await;

        let (ok, result) = match outcome {
            Ok(RunOutcome::Completed(answer)) => (true, Ok(answer)),
            Ok(RunOutcome::Cancelled) => (false, Err(LoomError::Cancelled)),
            Err(e) => (false, Err(e)),
        };
        events.emit(AgentEvent::SubagentFinished {
            call_id: request.call_id,
            ok,
        });
        result
    }
}
