use crate::config::RetryConfig;
use crate::errors::{LoomError, LoomResult};
use crate::events::EventSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A role-tagged conversation entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Whether this tool result represents an error (for role="tool").
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallRequest>>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_calls,
            ..Default::default()
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            is_error,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub model: Option<&'a str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The language-model capability, treated as a black box: given messages and
/// a tool schema, it returns text, tool invocations, or both.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse>;

    fn default_model(&self) -> &str;

    /// Streaming variant. Implementations that stream should emit
    /// [`AgentEvent::ContentDelta`](crate::AgentEvent::ContentDelta) chunks
    /// into `events` as tokens arrive and resolve to the same structured
    /// response `chat` would return. The default forwards to `chat` without
    /// emitting deltas.
    async fn chat_stream(
        &self,
        req: ChatRequest<'_>,
        _events: &EventSink,
    ) -> anyhow::Result<LLMResponse> {
        self.chat(req).await
    }
}

/// Invoke the provider with bounded retries and exponential backoff.
///
/// A timed-out or failed call is retried up to `retry.max_retries` times;
/// after that the failure surfaces as a non-retryable run-level
/// [`LoomError::Provider`].
#[allow(clippy::too_many_arguments)]
pub async fn chat_with_retry(
    provider: &dyn LLMProvider,
    messages: &[Message],
    tools: &[ToolDefinition],
    model: Option<&str>,
    max_tokens: u32,
    temperature: f32,
    retry: &RetryConfig,
    call_timeout: Duration,
    events: &EventSink,
) -> LoomResult<LLMResponse> {
    let mut last_error = String::new();

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            let backoff = (retry.initial_delay_ms as f64
                * retry.backoff_multiplier.powi(attempt as i32 - 1))
            .min(retry.max_delay_ms as f64);
            let jitter = fastrand::f64() * backoff * 0.25;
            let delay = Duration::from_millis((backoff + jitter) as u64);
            warn!(
                "Provider call failed ({}), retry {}/{} after {:?}",
                last_error, attempt, retry.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }

        let req = ChatRequest {
            messages: messages.to_vec(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
            model,
            max_tokens,
            temperature,
        };

        match tokio::time::timeout(call_timeout, provider.chat_stream(req, events)).await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("timed out after {:?}", call_timeout),
        }
    }

    Err(LoomError::Provider {
        message: format!(
            "giving up after {} retries: {}",
            retry.max_retries, last_error
        ),
        retryable: false,
    })
}
