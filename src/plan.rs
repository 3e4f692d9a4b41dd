//! Plan validation and replacement.
//!
//! The model's `write_todos` call is an untrusted input: every safety and
//! ordering invariant is enforced here before the plan is applied, never
//! assumed from model behavior. On any rejection the old plan is retained
//! unmutated.

use crate::errors::{LoomError, LoomResult};
use crate::state::{PlanItem, PlanStatus, RunState};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One plan entry as the model submits it. `id` is present only when the
/// model is carrying an existing item forward.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanItemInput {
    pub content: String,
    #[serde(rename = "activeForm", default)]
    pub active_form: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub id: Option<String>,
}

const EMPTY_FIRST_PLAN: &str = "Empty todos list. You must create the plan yourself by analyzing \
     the task and breaking it into specific steps. write_todos only records your plan - call it \
     with the complete list of steps you came up with.";

/// Replace the plan wholesale with `inputs`.
///
/// `inputs` is a full replacement list, not a patch. Validation:
///
/// - each id may appear at most once in `inputs`
///   ([`LoomError::InvalidPlanState`]);
/// - an item present in both lists by id that was `completed` must remain
///   `completed` with unchanged content ([`LoomError::PlanIntegrity`]);
/// - at most one item may be `in_progress`, zero is fine
///   ([`LoomError::InvalidPlanState`]);
/// - an empty list is rejected while no plan exists yet, forcing at least
///   one real planning step before work begins.
///
/// On success, `completed_at` is stamped for items newly transitioned to
/// `completed` and the progress counters on [`RunState`] are refreshed.
/// Returns a human-readable summary for the tool result.
pub fn replace_plan(state: &mut RunState, inputs: Vec<PlanItemInput>) -> LoomResult<String> {
    if inputs.is_empty() && state.plan_items.is_empty() {
        return Err(LoomError::InvalidPlanState(EMPTY_FIRST_PLAN.to_string()));
    }

    // Duplicate ids would let one submission carry the same item under two
    // statuses, defeating the completed-item checks below.
    let mut seen_ids = HashSet::new();
    for input in &inputs {
        let Some(id) = input.id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !seen_ids.insert(id) {
            return Err(LoomError::InvalidPlanState(format!(
                "item id '{id}' appears more than once in the submitted list"
            )));
        }
    }

    let in_progress = inputs
        .iter()
        .filter(|i| i.status == PlanStatus::InProgress)
        .count();
    if in_progress > 1 {
        return Err(LoomError::InvalidPlanState(format!(
            "{} items marked in_progress; at most one step may be active at a time",
            in_progress
        )));
    }

    let old_by_id: HashMap<&str, &PlanItem> = state
        .plan_items
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    for input in &inputs {
        let Some(id) = input.id.as_deref() else {
            continue;
        };
        let Some(old) = old_by_id.get(id) else {
            continue;
        };
        if old.status == PlanStatus::Completed {
            if input.status != PlanStatus::Completed {
                return Err(LoomError::PlanIntegrity(format!(
                    "item '{}' is completed and cannot go back to {}",
                    old.content, input.status
                )));
            }
            if input.content != old.content {
                return Err(LoomError::PlanIntegrity(format!(
                    "item '{}' is completed and its content cannot change",
                    old.content
                )));
            }
        }
    }

    let now = Utc::now();
    let mut newly_completed = 0usize;
    let new_items: Vec<PlanItem> = inputs
        .into_iter()
        .map(|input| {
            let old = input.id.as_deref().and_then(|id| old_by_id.get(id).copied());
            let completed_at = match (old, input.status) {
                // Carried forward: keep an existing stamp, add one on the
                // pending/in_progress -> completed transition.
                (Some(prev), PlanStatus::Completed) => {
                    if prev.status != PlanStatus::Completed {
                        newly_completed += 1;
                        Some(now)
                    } else {
                        prev.completed_at
                    }
                }
                (None, PlanStatus::Completed) => {
                    newly_completed += 1;
                    Some(now)
                }
                _ => None,
            };
            let active_form = if input.active_form.is_empty() {
                input.content.clone()
            } else {
                input.active_form
            };
            PlanItem {
                id: input
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                content: input.content,
                active_form,
                status: input.status,
                created_at: old.map_or(now, |prev| prev.created_at),
                completed_at,
            }
        })
        .collect();

    state.plan_items = new_items;
    state.metrics.completed_items = state.completed_items();
    if newly_completed > 0 {
        state.metrics.last_completion_iteration = Some(state.iteration);
        state.metrics.no_progress_turns = 0;
        state.metrics.tool_calls_since_completion = 0;
        state.metrics.signature_repeats = 0;
    }

    let summary: Vec<String> = state
        .plan_items
        .iter()
        .map(|item| format!("- [{}] {}", item.status, item.content))
        .collect();
    Ok(format!(
        "Updated todo list ({} tasks):\n{}",
        state.plan_items.len(),
        summary.join("\n")
    ))
}
