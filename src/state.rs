use crate::provider::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Reserved virtual-filesystem namespace that evicted tool results are
/// written into, keyed by the originating tool-call id.
pub const LARGE_RESULTS_PREFIX: &str = "/large_tool_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::InProgress => write!(f, "in_progress"),
            PlanStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One unit of declared work with a lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    pub content: String,
    /// Present-continuous form shown while the item is in progress
    /// (e.g. "Scanning the repository").
    #[serde(rename = "activeForm")]
    pub active_form: String,
    pub status: PlanStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlanItem {
    pub fn new(content: impl Into<String>, active_form: impl Into<String>, status: PlanStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            active_form: active_form.into(),
            status,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Derived counters, recomputable from `plan_items` and `messages`, cached
/// here so middleware can read them without rescanning history every turn.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Plan items currently in `completed` status.
    pub completed_items: usize,
    /// Iteration at which an item most recently transitioned to `completed`.
    pub last_completion_iteration: Option<usize>,
    /// Consecutive loop turns without a completion while a plan exists.
    pub no_progress_turns: usize,
    /// Tool calls executed since the last completion.
    pub tool_calls_since_completion: usize,
    /// Signature (`name:arguments`) of the most recent tool call.
    pub last_tool_signature: Option<String>,
    /// How many times the last signature repeated back to back.
    pub signature_repeats: usize,
    /// Times the summarizer has fired during this run.
    pub summarizations: usize,
    /// Stagnation advisories injected so far.
    pub stagnation_warnings: usize,
}

/// The mutable record shared by one agent execution.
///
/// Owned exclusively by the [`AgentLoop`](crate::AgentLoop) that created it
/// and passed by mutable reference to every middleware hook and tool for the
/// lifetime of the run. Never shared across a delegation boundary; a child
/// run receives a fresh, independently owned instance.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    /// Role-tagged conversation, append-only except when the summarizer
    /// replaces a prefix.
    pub messages: Vec<Message>,
    /// Ordered plan. Insertion order is the intended execution order but is
    /// advisory, not enforced.
    pub plan_items: Vec<PlanItem>,
    /// Virtual filesystem: forward-slash-rooted path to content. No
    /// directory objects; prefix matching substitutes for hierarchy.
    pub files: BTreeMap<String, String>,
    /// Incremented once per loop turn.
    pub iteration: usize,
    /// Delegation nesting level, 0 at the root.
    pub subagent_depth: usize,
    pub metrics: RunMetrics,
}

impl RunState {
    /// Root state: empty plan and files, a single seed task message, plus an
    /// optional leading system instruction.
    pub fn new(instruction: Option<&str>, task: &str) -> Self {
        let mut messages = Vec::new();
        if let Some(instruction) = instruction {
            messages.push(Message::system(instruction));
        }
        messages.push(Message::user(task));
        Self {
            run_id: Uuid::new_v4().to_string(),
            messages,
            plan_items: Vec::new(),
            files: BTreeMap::new(),
            iteration: 0,
            subagent_depth: 0,
            metrics: RunMetrics::default(),
        }
    }

    /// Isolated child state for a delegated sub-task. Only the explicitly
    /// shared `context_files` are visible; the parent's messages and plan
    /// never are.
    pub fn child(
        depth: usize,
        instruction: Option<&str>,
        task: &str,
        context_files: BTreeMap<String, String>,
    ) -> Self {
        let mut state = Self::new(instruction, task);
        state.subagent_depth = depth;
        state.files = context_files;
        state
    }

    pub fn completed_items(&self) -> usize {
        self.plan_items
            .iter()
            .filter(|i| i.status == PlanStatus::Completed)
            .count()
    }

    pub fn in_progress_items(&self) -> usize {
        self.plan_items
            .iter()
            .filter(|i| i.status == PlanStatus::InProgress)
            .count()
    }

    pub fn plan_finished(&self) -> bool {
        !self.plan_items.is_empty() && self.completed_items() == self.plan_items.len()
    }

    /// Last non-empty assistant text, used as the best-effort partial result
    /// when the iteration budget runs out.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant" && !m.content.trim().is_empty())
            .map(|m| m.content.clone())
    }
}
