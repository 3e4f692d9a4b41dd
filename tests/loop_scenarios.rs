//! End-to-end loop scenarios against a scripted provider: eviction,
//! summarization, stagnation, and plan-rejection recovery.

mod common;

use agentloom::{AgentLoop, EventSink, RunConfig, RunOutcome, RunState};
use common::{NoisyTool, ScriptedProvider, plan_call, text, tool_call};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EVICTED_PREFIX: &str = "/large_tool_results";

#[tokio::test]
async fn oversized_tool_result_is_evicted_byte_for_byte() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call("c1", "blob", json!({})),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider, RunConfig::default()).with_tool(Arc::new(NoisyTool {
        name: "blob",
        chars: 150_000,
    }));

    let mut state = RunState::new(None, "dump the blob");
    let outcome = agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));

    // full content preserved at the eviction path
    let stored = &state.files[&format!("{EVICTED_PREFIX}/c1")];
    assert_eq!(stored.len(), 150_000);
    assert!(stored.chars().all(|c| c == 'n'));

    // the conversation carries only a short pointer
    let tool_msg = &state.messages[2];
    assert_eq!(tool_msg.role, "tool");
    assert!(tool_msg.content.chars().count() < 300);
    assert!(tool_msg.content.contains(&format!("{EVICTED_PREFIX}/c1")));
    assert!(tool_msg.content.contains("150000 chars"));
}

#[tokio::test]
async fn summarization_fires_and_evicted_files_survive() {
    let config = RunConfig {
        summary_trigger_tokens: 5_000,
        messages_to_keep: 4,
        ..RunConfig::default()
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call("c1", "evict_me", json!({})),
        tool_call("c2", "chatter", json!({})),
        tool_call("c3", "chatter", json!({})),
        tool_call("c4", "chatter", json!({})),
        tool_call("c5", "chatter", json!({})),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), config)
        .with_tool(Arc::new(NoisyTool {
            name: "evict_me",
            chars: 150_000,
        }))
        .with_tool(Arc::new(NoisyTool {
            name: "chatter",
            chars: 60_000,
        }));

    let mut state = RunState::new(None, "generate noise");
    let outcome = agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));

    assert!(state.metrics.summarizations >= 1);
    assert!(provider.summary_calls() >= 1);
    assert!(
        state
            .messages
            .iter()
            .any(|m| m.role == "system" && m.content.starts_with("[Context summary")),
        "summary marker missing from conversation"
    );
    // the evicted file outlives summarization of the pointer message
    assert_eq!(
        state.files[&format!("{EVICTED_PREFIX}/c1")].len(),
        150_000
    );
}

#[tokio::test]
async fn repeated_identical_calls_draw_a_stagnation_advisory() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan_call("c0"),
        tool_call("c1", "list_files", json!({})),
        tool_call("c2", "list_files", json!({})),
        tool_call("c3", "list_files", json!({})),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider, RunConfig::default());

    let mut state = RunState::new(None, "spin");
    agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(state.metrics.stagnation_warnings >= 1);
    assert!(
        state
            .messages
            .iter()
            .any(|m| m.role == "system" && m.content.starts_with("Progress check")),
        "advisory missing from conversation"
    );
}

#[tokio::test]
async fn empty_first_plan_is_rejected_then_corrected() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call("c1", "write_todos", json!({"todos": []})),
        plan_call("c2"),
        text("planned"),
    ]));
    let agent = AgentLoop::new(provider, RunConfig::default());

    let mut state = RunState::new(None, "plan something");
    let outcome = agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("planned".into()));

    let rejection = &state.messages[2];
    assert!(rejection.is_error);
    assert!(rejection.content.contains("create the plan yourself"));
    assert_eq!(state.plan_items.len(), 1);
}

#[tokio::test]
async fn iteration_limit_reports_partial_answer() {
    let config = RunConfig {
        max_iterations: 3,
        ..RunConfig::default()
    };
    let mut responses = vec![agentloom::LLMResponse {
        content: Some("halfway there".into()),
        tool_calls: vec![agentloom::ToolCallRequest {
            id: "c1".into(),
            name: "list_files".into(),
            arguments: json!({}),
        }],
    }];
    responses.push(tool_call("c2", "list_files", json!({})));
    responses.push(tool_call("c3", "list_files", json!({})));
    let provider = Arc::new(ScriptedProvider::new(responses));
    let agent = AgentLoop::new(provider, config);

    let err = agent
        .run("loop forever", &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        agentloom::LoomError::IterationLimit { iterations, partial } => {
            assert_eq!(iterations, 3);
            assert_eq!(partial.as_deref(), Some("halfway there"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
