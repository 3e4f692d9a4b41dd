use crate::state::PlanItem;
use serde::Serialize;
use tokio::sync::mpsc;

/// Typed events emitted during a run for an external presentation layer.
///
/// The stream is finite and ends when the run terminates; a new run produces
/// a new stream. Child runs do not surface their internal events, only the
/// `Subagent*` markers appear on the parent stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ContentDelta {
        text: String,
    },
    PlanChanged {
        items: Vec<PlanItem>,
    },
    ToolInvoked {
        call_id: String,
        name: String,
    },
    ToolResult {
        call_id: String,
        name: String,
        is_error: bool,
        chars: usize,
    },
    ProgressUpdate {
        completed: usize,
        total: usize,
    },
    SubagentStarted {
        call_id: String,
        description: String,
        depth: usize,
    },
    SubagentFinished {
        call_id: String,
        ok: bool,
    },
    RunFinished {
        outcome: String,
    },
}

/// Sending half of the event stream.
///
/// A sink is cheap to clone and safe to emit into after the consumer is
/// gone: a dropped receiver silently discards events, so event emission can
/// never fail a run.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything. Used for child runs, whose internal
    /// events stay internal.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
