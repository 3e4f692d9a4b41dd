//! The agent execution loop.
//!
//! One [`AgentLoop`] value describes a reusable agent: a provider, a
//! configuration, optional extra tools and middleware. Each call to
//! [`AgentLoop::run`] owns a fresh [`RunState`] and drives the
//! call-model/execute-tools cycle until the model answers in plain text,
//! the iteration budget runs out, or the run is cancelled.

use crate::config::RunConfig;
use crate::errors::{LoomError, LoomResult};
use crate::events::{AgentEvent, EventSink};
use crate::middleware::{
    AgentMiddleware, EvictionMiddleware, MiddlewareStack, ProgressMiddleware, SummarizeMiddleware,
};
use crate::provider::{LLMProvider, Message, chat_with_retry};
use crate::state::RunState;
use crate::subagent::Delegator;
use crate::tools::{
    ListFilesTool, ReadFileTool, SearchFilesTool, TaskTool, Tool, ToolRegistry, WriteFileTool,
    WriteTodosTool,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive empty model responses tolerated before the run fails.
const MAX_EMPTY_RESPONSES: usize = 3;

/// How a run ended, when it ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a final plain-text answer.
    Completed(String),
    /// The cancellation token fired before a final answer.
    Cancelled,
}

pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    config: RunConfig,
    instruction: Option<String>,
    extra_tools: Vec<Arc<dyn Tool>>,
    extra_middleware: Vec<Arc<dyn AgentMiddleware>>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LLMProvider>, config: RunConfig) -> Self {
        Self {
            provider,
            config,
            instruction: None,
            extra_tools: Vec::new(),
            extra_middleware: Vec::new(),
        }
    }

    /// System instruction prepended to every run (and its child runs).
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Register a caller-supplied tool alongside the built-ins. Also
    /// available to delegated child runs.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    /// Append middleware after the built-in stack. Applies to this loop's
    /// runs only; child runs get the built-in stack.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn AgentMiddleware>) -> Self {
        self.extra_middleware.push(middleware);
        self
    }

    /// Run the agent on `task` from a fresh state.
    pub async fn run(
        &self,
        task: &str,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> LoomResult<RunOutcome> {
        let mut state = RunState::new(self.instruction.as_deref(), task);
        self.run_state(&mut state, events, cancel).await
    }

    /// Run the agent over a caller-owned state. The state is left in its
    /// final form on return, whatever the outcome, so callers can inspect
    /// messages, plan, and files afterwards.
    pub async fn run_state(
        &self,
        state: &mut RunState,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> LoomResult<RunOutcome> {
        let registry = self.build_registry();
        let middleware = self.build_middleware();
        let definitions = registry.definitions();
        let model = self.config.model.as_deref();
        let mut empty_responses = 0usize;

        info!(run_id = %state.run_id, depth = state.subagent_depth, "run started");

        while state.iteration < self.config.max_iterations {
            if cancel.is_cancelled() {
                return self.finish(events, RunOutcome::Cancelled);
            }

            middleware.pre_call(state, events).await;

            let response = tokio::select! {
                () = cancel.cancelled() => {
                    return self.finish(events, RunOutcome::Cancelled);
                }
                r = chat_with_retry(
                    self.provider.as_ref(),
                    &state.messages,
                    &definitions,
                    model,
                    self.config.max_tokens,
                    self.config.temperature,
                    &self.config.retry,
                    self.config.model_timeout(),
                    events,
                ) => match r {
                    Ok(response) => response,
                    Err(e) => {
                        events.emit(AgentEvent::RunFinished {
                            outcome: "failed".into(),
                        });
                        return Err(e);
                    }
                },
            };

            if response.has_tool_calls() {
                empty_responses = 0;
                let content = response.content.clone().unwrap_or_default();
                state
                    .messages
                    .push(Message::assistant(content, Some(response.tool_calls.clone())));

                for call in &response.tool_calls {
                    if cancel.is_cancelled() {
                        return self.finish(events, RunOutcome::Cancelled);
                    }
                    events.emit(AgentEvent::ToolInvoked {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                    });

                    let mut result = match middleware.pre_tool(call, state, events).await {
                        Some(result) => result,
                        None => registry.execute(call, state, events, cancel).await,
                    };
                    middleware.post_tool(call, &mut result, state, events).await;

                    events.emit(AgentEvent::ToolResult {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        is_error: result.is_error,
                        chars: result.content.chars().count(),
                    });
                    state.messages.push(Message::tool_result(
                        &call.id,
                        &result.content,
                        result.is_error,
                    ));
                }
            } else if let Some(text) = response
                .content
                .filter(|content| !content.trim().is_empty())
            {
                // Plain text with no tool calls is the completion signal.
                state.messages.push(Message::assistant(text.clone(), None));
                debug!(run_id = %state.run_id, iteration = state.iteration, "run completed");
                return self.finish(events, RunOutcome::Completed(text));
            } else {
                empty_responses += 1;
                warn!(
                    attempt = empty_responses,
                    "model returned neither text nor tool calls"
                );
                if empty_responses >= MAX_EMPTY_RESPONSES {
                    events.emit(AgentEvent::RunFinished {
                        outcome: "failed".into(),
                    });
                    return Err(LoomError::Provider {
                        message: format!(
                            "model returned {empty_responses} consecutive empty responses"
                        ),
                        retryable: false,
                    });
                }
                let jitter = fastrand::u64(..250);
                tokio::time::sleep(Duration::from_millis(250 + jitter)).await;
            }

            middleware.post_call(state, events).await;
            state.iteration += 1;
        }

        events.emit(AgentEvent::RunFinished {
            outcome: "iteration_limit".into(),
        });
        Err(LoomError::IterationLimit {
            iterations: state.iteration,
            partial: state.last_assistant_text(),
        })
    }

    fn finish(&self, events: &EventSink, outcome: RunOutcome) -> LoomResult<RunOutcome> {
        let label = match &outcome {
            RunOutcome::Completed(_) => "completed",
            RunOutcome::Cancelled => "cancelled",
        };
        events.emit(AgentEvent::RunFinished {
            outcome: label.into(),
        });
        Ok(outcome)
    }

    fn build_registry(&self) -> ToolRegistry {
        let delegator = Arc::new(Delegator::new(
            self.provider.clone(),
            self.config.clone(),
            self.instruction.clone(),
            self.extra_tools.clone(),
        ));

        let mut registry = ToolRegistry::new(self.config.tool_timeout());
        registry.register(Arc::new(WriteTodosTool));
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(ListFilesTool));
        registry.register(Arc::new(SearchFilesTool));
        registry.register(Arc::new(TaskTool::new(delegator)));
        for tool in &self.extra_tools {
            registry.register(tool.clone());
        }
        registry
    }

    fn build_middleware(&self) -> MiddlewareStack {
        let mut members: Vec<Arc<dyn AgentMiddleware>> = vec![
            Arc::new(EvictionMiddleware::new(self.config.eviction_threshold_chars)),
            Arc::new(ProgressMiddleware::new(
                self.config.stagnation_turns_threshold,
                self.config.stagnation_tool_calls_threshold,
                self.config.same_signature_threshold,
            )),
            Arc::new(SummarizeMiddleware::new(
                self.provider.clone(),
                self.config.model.clone(),
                self.config.summary_trigger_tokens,
                self.config.messages_to_keep,
            )),
        ];
        members.extend(self.extra_middleware.iter().cloned());
        MiddlewareStack::new(members)
    }
}
