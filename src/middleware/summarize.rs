//! History summarization.
//!
//! When the estimated token footprint of the conversation crosses the
//! trigger, everything except a leading system instruction and the most
//! recent messages is condensed into one synthetic system message via a
//! secondary model call. A failed secondary call degrades to a mechanical
//! truncation summary rather than failing the run.

use crate::events::EventSink;
use crate::middleware::AgentMiddleware;
use crate::provider::{ChatRequest, LLMProvider, Message};
use crate::state::RunState;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

const SNIPPET_CHARS: usize = 500;
const SUMMARY_MAX_TOKENS: u32 = 2000;
const SUMMARY_TEMPERATURE: f32 = 0.3;

// The non-LLM fallback must itself stay small; an unbounded snippet dump
// would re-create the pressure it is standing in for.
const FALLBACK_MAX_MESSAGES: usize = 20;
const FALLBACK_SNIPPET_CHARS: usize = 200;

const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation excerpt densely. \
     Preserve: decisions made, facts discovered, file paths touched, task progress, and any \
     unresolved questions. Omit pleasantries and repetition. Output only the summary.\n\n";

/// Rough token estimate: one token per four characters, counting message
/// content plus serialized tool calls.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages
        .iter()
        .map(|m| {
            let mut n = m.content.chars().count();
            if let Some(calls) = &m.tool_calls {
                n += serde_json::to_string(calls).map_or(0, |s| s.chars().count());
            }
            n
        })
        .sum();
    chars / 4
}

pub struct SummarizeMiddleware {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    trigger_tokens: usize,
    keep_recent: usize,
}

impl SummarizeMiddleware {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: Option<String>,
        trigger_tokens: usize,
        keep_recent: usize,
    ) -> Self {
        Self {
            provider,
            model,
            trigger_tokens,
            keep_recent,
        }
    }

    fn snippets(old: &[Message]) -> String {
        let mut out = String::new();
        for m in old {
            let snippet: String = m.content.chars().take(SNIPPET_CHARS).collect();
            let _ = writeln!(out, "[{}] {}", m.role, snippet);
        }
        out
    }

    /// Mechanical stand-in for a failed summarization call: short snippets
    /// of the oldest messages, capped in both count and width.
    fn fallback_summary(old: &[Message]) -> String {
        let shown = old.len().min(FALLBACK_MAX_MESSAGES);
        let mut out = String::new();
        for m in &old[..shown] {
            let snippet: String = m.content.chars().take(FALLBACK_SNIPPET_CHARS).collect();
            let _ = writeln!(out, "[{}] {}", m.role, snippet);
        }
        if old.len() > shown {
            let _ = writeln!(out, "({} further messages elided)", old.len() - shown);
        }
        out
    }

    async fn summarize(&self, old: &[Message]) -> String {
        let prompt = format!("{SUMMARY_INSTRUCTION}{}", Self::snippets(old));
        let req = ChatRequest {
            messages: vec![Message::user(prompt)],
            tools: None,
            model: self.model.as_deref(),
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        };
        match self.provider.chat(req).await {
            Ok(response) => match response.content {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    warn!("summarization call returned no text, falling back to truncation");
                    Self::fallback_summary(old)
                }
            },
            Err(e) => {
                warn!(error = %e, "summarization call failed, falling back to truncation");
                Self::fallback_summary(old)
            }
        }
    }
}

#[async_trait]
impl AgentMiddleware for SummarizeMiddleware {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn post_call(&self, state: &mut RunState, _events: &EventSink) {
        let has_system = state
            .messages
            .first()
            .is_some_and(|m| m.role == "system");
        let preserved = usize::from(has_system);

        // Folding fewer than two messages is pointless
        if state.messages.len() <= preserved + self.keep_recent + 1 {
            return;
        }
        if estimate_tokens(&state.messages) < self.trigger_tokens {
            return;
        }

        let split = state.messages.len() - self.keep_recent;
        let old = &state.messages[preserved..split];
        if old.is_empty() {
            return;
        }

        let summary = self.summarize(old).await;
        let marker = format!("[Context summary — {} messages]\n{summary}", old.len());

        let mut rebuilt = Vec::with_capacity(preserved + 1 + self.keep_recent);
        if has_system {
            rebuilt.push(state.messages[0].clone());
        }
        rebuilt.push(Message::system(marker));
        rebuilt.extend_from_slice(&state.messages[split..]);

        info!(
            summarized = old.len(),
            kept = self.keep_recent,
            "conversation history summarized"
        );
        state.messages = rebuilt;
        state.metrics.summarizations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LLMResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("provider down");
            }
            assert!(req.messages[0].content.starts_with("Summarize"));
            Ok(LLMResponse {
                content: Some("condensed history".into()),
                tool_calls: vec![],
            })
        }

        fn default_model(&self) -> &str {
            "mock"
        }
    }

    fn padded_state(message_count: usize, chars_each: usize) -> RunState {
        let mut state = RunState::new(None, "seed task");
        for i in 1..message_count {
            let filler = "m".repeat(chars_each);
            if i % 2 == 0 {
                state.messages.push(Message::user(filler));
            } else {
                state.messages.push(Message::assistant(filler, None));
            }
        }
        state
    }

    fn middleware(fail: bool) -> (Arc<StubProvider>, SummarizeMiddleware) {
        let provider = Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
            fail,
        });
        let mw = SummarizeMiddleware::new(provider.clone(), None, 1_000, 6);
        (provider, mw)
    }

    #[test]
    fn token_estimate_counts_tool_calls() {
        let plain = vec![Message::user("x".repeat(400))];
        assert_eq!(estimate_tokens(&plain), 100);

        let with_calls = vec![Message::assistant(
            "",
            Some(vec![crate::provider::ToolCallRequest {
                id: "c1".into(),
                name: "read_file".into(),
                arguments: serde_json::json!({"path": "/a"}),
            }]),
        )];
        assert!(estimate_tokens(&with_calls) > 0);
    }

    #[tokio::test]
    async fn below_trigger_is_untouched() {
        let (provider, mw) = middleware(false);
        let mut state = padded_state(20, 10);
        mw.post_call(&mut state, &EventSink::disabled()).await;
        assert_eq!(state.messages.len(), 20);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.metrics.summarizations, 0);
    }

    #[tokio::test]
    async fn over_trigger_collapses_to_summary_plus_recent() {
        let (provider, mw) = middleware(false);
        // 20 messages of 1000 chars each: ~5000 tokens, well over 1000
        let mut state = padded_state(20, 1_000);
        mw.post_call(&mut state, &EventSink::disabled()).await;

        // summary message + last 6 verbatim
        assert_eq!(state.messages.len(), 7);
        assert_eq!(state.messages[0].role, "system");
        assert!(state.messages[0].content.starts_with("[Context summary — 14 messages]"));
        assert!(state.messages[0].content.contains("condensed history"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.metrics.summarizations, 1);
    }

    #[tokio::test]
    async fn leading_system_instruction_is_preserved() {
        let (_, mw) = middleware(false);
        let mut state = RunState::new(Some("be terse"), "seed");
        for _ in 0..18 {
            state.messages.push(Message::user("m".repeat(1_000)));
        }
        mw.post_call(&mut state, &EventSink::disabled()).await;

        assert_eq!(state.messages.len(), 8);
        assert_eq!(state.messages[0].content, "be terse");
        assert!(state.messages[1].content.starts_with("[Context summary"));
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_snippets() {
        let (provider, mw) = middleware(true);
        let mut state = padded_state(20, 1_000);
        mw.post_call(&mut state, &EventSink::disabled()).await;

        // still collapses, with truncated snippets instead of model output
        assert_eq!(state.messages.len(), 7);
        assert!(state.messages[0].content.starts_with("[Context summary"));
        assert!(state.messages[0].content.contains("[user]"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.metrics.summarizations, 1);
    }

    #[tokio::test]
    async fn fallback_stays_bounded_on_long_histories() {
        let (_, mw) = middleware(true);
        let mut state = padded_state(80, 2_000);
        mw.post_call(&mut state, &EventSink::disabled()).await;

        assert_eq!(state.messages.len(), 7);
        let summary = &state.messages[0].content;
        // at most 20 snippets of 200 chars plus framing, never the raw 148k
        assert!(summary.chars().count() < 5_000);
        assert!(summary.contains("54 further messages elided"));
    }

    #[tokio::test]
    async fn short_history_never_summarized_even_over_budget() {
        let (provider, mw) = middleware(false);
        // 5 messages, each enormous: over the token trigger but at or under
        // the keep window, so there is nothing to fold
        let mut state = padded_state(5, 10_000);
        mw.post_call(&mut state, &EventSink::disabled()).await;
        assert_eq!(state.messages.len(), 5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
