//! Shared scaffolding for integration tests: a scripted provider and a few
//! response constructors.
#![allow(dead_code)]

use agentloom::tools::{Tool, ToolInvocation, ToolResult};
use agentloom::{ChatRequest, LLMProvider, LLMResponse, ToolCallRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Plays back a fixed sequence of responses. Summarization calls (whose
/// prompt starts with "Summarize") are answered out of band so they do not
/// disturb the scripted conversation; once the script is exhausted, every
/// call gets a terminal "Mock response".
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<LLMResponse>>,
    calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
        }
    }

    /// Chat calls served from the script (summarization calls excluded).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
        let is_summary = req.tools.is_none()
            && req
                .messages
                .first()
                .is_some_and(|m| m.content.starts_with("Summarize"));
        if is_summary {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(text("condensed history"));
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| text("Mock response")))
    }

    fn default_model(&self) -> &str {
        "mock"
    }
}

pub fn text(content: &str) -> LLMResponse {
    LLMResponse {
        content: Some(content.into()),
        tool_calls: vec![],
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> LLMResponse {
    LLMResponse {
        content: None,
        tool_calls: vec![ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        }],
    }
}

/// A one-item plan, enough to satisfy tools that require planning first.
pub fn plan_call(id: &str) -> LLMResponse {
    tool_call(
        id,
        "write_todos",
        json!({"todos": [
            {"content": "do the work", "activeForm": "Doing the work", "status": "in_progress"}
        ]}),
    )
}

/// Test tool that emits a fixed amount of output, for exercising eviction
/// and summarization pressure. Named so multiple instances can coexist in
/// one registry.
pub struct NoisyTool {
    pub name: &'static str,
    pub chars: usize,
}

#[async_trait]
impl Tool for NoisyTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Produce a large blob of output"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(
        &self,
        _params: Value,
        _invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        Ok(ToolResult::ok("n".repeat(self.chars)))
    }
}
