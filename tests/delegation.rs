//! Delegation scenarios: gating, depth limits, isolation, and event markers.

mod common;

use agentloom::{AgentEvent, AgentLoop, EventSink, RunConfig, RunOutcome, RunState};
use common::{ScriptedProvider, plan_call, text, tool_call};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn task_call(id: &str, context_files: Vec<&str>) -> agentloom::LLMResponse {
    tool_call(
        id,
        "task",
        json!({
            "description": "sub-task",
            "prompt": "do the delegated work",
            "context_files": context_files,
        }),
    )
}

#[tokio::test]
async fn delegation_without_a_plan_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        task_call("c1", vec![]),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), RunConfig::default());

    let mut state = RunState::new(None, "delegate blindly");
    let outcome = agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));

    let rejection = &state.messages[2];
    assert!(rejection.is_error);
    assert!(rejection.content.contains("Planning required before delegation"));
    // no child run: exactly the two scripted parent calls
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn depth_limit_zero_blocks_all_delegation() {
    let config = RunConfig {
        max_subagent_depth: 0,
        ..RunConfig::default()
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan_call("c0"),
        task_call("c1", vec![]),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), config);

    let mut state = RunState::new(None, "try to delegate");
    agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();

    let rejection = state.messages.iter().find(|m| m.is_error).unwrap();
    assert!(rejection.content.contains("Delegation failed"));
    assert!(rejection.content.contains("depth 1 exceeds"));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn delegated_run_is_isolated_and_returns_one_tool_message() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        // parent
        plan_call("c0"),
        tool_call(
            "c1",
            "write_file",
            json!({"path": "/shared.md", "content": "context for the child"}),
        ),
        task_call("c2", vec!["/shared.md"]),
        // child (served from the same script, in order)
        tool_call(
            "k1",
            "write_file",
            json!({"path": "/child-scratch.md", "content": "internal"}),
        ),
        text("child answer"),
        // parent resumes
        text("all done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), RunConfig::default());
    let (sink, mut rx) = EventSink::channel();

    let mut state = RunState::new(None, "delegate with context");
    let outcome = agent
        .run_state(&mut state, &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("all done".into()));
    assert_eq!(provider.calls(), 6);

    // the whole child run surfaces as exactly one tool message
    let task_result = state
        .messages
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("c2"))
        .unwrap();
    assert!(!task_result.is_error);
    assert_eq!(task_result.content, "child answer");

    // child writes never leak into the parent's filesystem
    assert!(state.files.contains_key("/shared.md"));
    assert!(!state.files.contains_key("/child-scratch.md"));

    // only the subagent markers cross the boundary, at depth 1
    let mut started = 0;
    let mut finished_ok = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            AgentEvent::SubagentStarted { depth, .. } => {
                assert_eq!(depth, 1);
                started += 1;
            }
            AgentEvent::SubagentFinished { ok, .. } => {
                assert!(ok);
                finished_ok += 1;
            }
            _ => {}
        }
    }
    assert_eq!(started, 1);
    assert_eq!(finished_ok, 1);
}

#[tokio::test]
async fn missing_context_file_fails_the_task_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        plan_call("c0"),
        task_call("c1", vec!["/nope.md"]),
        text("done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), RunConfig::default());

    let mut state = RunState::new(None, "delegate");
    agent
        .run_state(&mut state, &EventSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();

    let rejection = state.messages.iter().find(|m| m.is_error).unwrap();
    assert!(rejection.content.contains("Cannot share context file /nope.md"));
    // the delegation never started a child run
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn nesting_stops_at_the_configured_depth() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        // parent (depth 0)
        plan_call("c0"),
        task_call("c1", vec![]),
        // child (depth 1)
        plan_call("k0"),
        task_call("k1", vec![]),
        // grandchild (depth 2): tries to go one deeper and is refused
        plan_call("g0"),
        task_call("g1", vec![]),
        text("grandchild answer"),
        // child resumes
        text("child answer"),
        // parent resumes
        text("done"),
    ]));
    let agent = AgentLoop::new(provider.clone(), RunConfig::default());
    let (sink, mut rx) = EventSink::channel();

    let outcome = agent
        .run("nest deeply", &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed("done".into()));
    // every scripted response was a real provider call, including the
    // grandchild turn whose task call was refused without a child run
    assert_eq!(provider.calls(), 9);

    // grandchild markers stay inside the child's (disabled) stream
    let mut marker_depths = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::SubagentStarted { depth, .. } = event {
            marker_depths.push(depth);
        }
    }
    assert_eq!(marker_depths, vec![1]);
}

#[tokio::test]
async fn pre_cancelled_parent_cancels_before_any_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![text("never")]));
    let agent = AgentLoop::new(provider.clone(), RunConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = agent
        .run("task", &EventSink::disabled(), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(provider.calls(), 0);
}
