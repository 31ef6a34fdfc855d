//! Client-side state cache for one widget session.
//!
//! `StudySession` owns the planner and tools state for the lifetime of a
//! page. Local mutations apply immediately; remote state only flows in
//! through the `apply_remote_*` methods during bootstrap.

use serde_json::Value;

use crate::planner::model::{DEFAULT_WEEKLY_GOAL, MAX_HOURS, MAX_SNAPSHOTS, MIN_WEEKLY_GOAL};
use crate::planner::sanitize::{coerce_number, is_truthy, normalize_hours};
use crate::planner::{Confidence, PlannerState, Snapshot, StudyPlan, TimelineEntry, ToolsState};

/// Subject shown for a snapshot submitted without one.
const FALLBACK_SUBJECT: &str = "General";
/// Topic shown for a snapshot submitted without one.
const FALLBACK_TOPIC: &str = "Focus area";

/// Raw values of the study-plan form.
#[derive(Debug, Clone, Default)]
pub struct PlanForm {
    pub subject: String,
    pub topic: String,
    /// The hours input exactly as typed.
    pub hours: String,
    pub confidence: Confidence,
}

/// In-memory planner and tools state for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudySession {
    planner: PlannerState,
    tools: ToolsState,
}

impl StudySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planner(&self) -> &PlannerState {
        &self.planner
    }

    pub fn tools(&self) -> &ToolsState {
        &self.tools
    }

    /// Weekly goal used for progress: at least 1, falling back to the
    /// default when unset.
    pub fn effective_goal(&self) -> f64 {
        effective_goal(&self.planner)
    }

    /// Add the typed number of hours to this week's total, capped at the
    /// weekly goal. Returns `false` (and changes nothing) for input that is
    /// not a number or is negative.
    pub fn log_hours(&mut self, raw: &str) -> bool {
        let value = coerce_number(&Value::String(raw.to_string()));
        if value.is_nan() || value < 0.0 {
            return false;
        }
        let increment = if value.is_finite() {
            value.min(MAX_HOURS)
        } else {
            0.0
        };
        let total = (self.planner.logged_hours + increment).clamp(0.0, MAX_HOURS);
        self.planner.logged_hours = total.min(self.effective_goal());
        true
    }

    /// Record a submitted plan and prepend a matching snapshot.
    pub fn submit_plan(&mut self, form: &PlanForm) -> &StudyPlan {
        let hours = normalize_hours(&Value::String(form.hours.clone()));
        let snapshot = Snapshot {
            subject: non_empty_or(&form.subject, FALLBACK_SUBJECT),
            topic: non_empty_or(&form.topic, FALLBACK_TOPIC),
            hours,
        };
        self.planner.snapshots.insert(0, snapshot);
        self.planner.snapshots.truncate(MAX_SNAPSHOTS);

        self.planner.last_plan.insert(StudyPlan {
            subject: form.subject.clone(),
            topic: form.topic.clone(),
            hours,
            confidence: form.confidence,
        })
    }

    /// Tick or untick the timeline step at `index`. Returns `false` for an
    /// index outside the timeline.
    pub fn set_step_completed(&mut self, index: usize, completed: bool) -> bool {
        match self.tools.timeline.get_mut(index) {
            Some(entry) => {
                entry.completed = completed;
                true
            }
            None => false,
        }
    }

    /// Apply a full `{planner, tools}` payload from the server.
    pub fn apply_remote_state(&mut self, payload: &Value) {
        if let Some(planner) = payload.get("planner").filter(|v| is_truthy(v)) {
            self.apply_remote_planner(planner);
        }
        if let Some(tools) = payload.get("tools").filter(|v| is_truthy(v)) {
            self.apply_remote_tools(tools);
        }
    }

    /// Overwrite planner fields with server values that are present and
    /// valid; everything else keeps its local value.
    pub fn apply_remote_planner(&mut self, remote: &Value) {
        if let Some(hours) = remote.get("loggedHours").map(coerce_number) {
            if hours.is_finite() {
                self.planner.logged_hours = hours.clamp(0.0, MAX_HOURS);
            }
        }

        if let Some(goal) = remote.get("weeklyGoal").map(coerce_number) {
            if goal.is_finite() && goal > 0.0 {
                self.planner.weekly_goal = goal.clamp(MIN_WEEKLY_GOAL, MAX_HOURS);
            }
        }

        if let Some(items) = remote.get("snapshots").and_then(Value::as_array) {
            self.planner.snapshots = items
                .iter()
                .take(MAX_SNAPSHOTS)
                .filter_map(|item| serde_json::from_value::<Snapshot>(item.clone()).ok())
                .collect();
        }

        if let Some(mut plan) = remote
            .get("lastPlan")
            .filter(|v| is_truthy(v))
            .and_then(|v| serde_json::from_value::<StudyPlan>(v.clone()).ok())
        {
            plan.hours = if plan.hours.is_finite() {
                plan.hours.clamp(0.0, MAX_HOURS)
            } else {
                0.0
            };
            self.planner.last_plan = Some(plan);
        }
    }

    /// Rebuild the timeline over the canonical steps from the server's
    /// entries. Steps the server does not mention are incomplete.
    pub fn apply_remote_tools(&mut self, remote: &Value) {
        let incoming: &[Value] = remote
            .get("timeline")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.tools.timeline = TimelineEntry::canonical_defaults()
            .into_iter()
            .map(|mut entry| {
                entry.completed = incoming
                    .iter()
                    .find(|item| {
                        item.get("step").and_then(Value::as_str) == Some(entry.step.as_str())
                    })
                    .and_then(|item| item.get("completed"))
                    .is_some_and(is_truthy);
                entry
            })
            .collect();
    }
}

pub(crate) fn effective_goal(planner: &PlannerState) -> f64 {
    let goal = if planner.weekly_goal.is_nan() || planner.weekly_goal == 0.0 {
        DEFAULT_WEEKLY_GOAL
    } else {
        planner.weekly_goal
    };
    goal.max(MIN_WEEKLY_GOAL)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
