//! Planner data model: per-user state, wire views, and partial updates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed, ordered revision checklist. Step identity is the exact text.
pub const TIMELINE_STEPS: [&str; 5] = [
    "Complete syllabus overview",
    "Finish first round of notes",
    "Attempt 3 full past papers",
    "Conduct error analysis",
    "Final 2-week revision sprint",
];

/// Maximum number of snapshots kept, most recent first.
pub const MAX_SNAPSHOTS: usize = 5;
/// Upper bound for every hours field.
pub const MAX_HOURS: f64 = 200.0;
/// Lower bound for the weekly goal.
pub const MIN_WEEKLY_GOAL: f64 = 1.0;
/// Weekly goal for a fresh record.
pub const DEFAULT_WEEKLY_GOAL: f64 = 20.0;
/// Maximum characters kept from a subject.
pub const SUBJECT_MAX_CHARS: usize = 80;
/// Maximum characters kept from a topic.
pub const TOPIC_MAX_CHARS: usize = 120;

/// Self-assessed confidence attached to a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Exact-match lookup; `"low"` is not `Low`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded study session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub subject: String,
    pub topic: String,
    pub hours: f64,
}

/// The most recent study-session breakdown request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    pub subject: String,
    pub topic: String,
    pub hours: f64,
    #[serde(default)]
    pub confidence: Confidence,
}

/// One checklist step and its completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub step: String,
    #[serde(default)]
    pub completed: bool,
}

impl TimelineEntry {
    /// The canonical timeline with every step incomplete.
    pub fn canonical_defaults() -> Vec<TimelineEntry> {
        TIMELINE_STEPS
            .iter()
            .map(|step| TimelineEntry {
                step: (*step).to_string(),
                completed: false,
            })
            .collect()
    }
}

/// Weekly hours, recent sessions, and the last plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerState {
    pub logged_hours: f64,
    pub weekly_goal: f64,
    pub snapshots: Vec<Snapshot>,
    pub last_plan: Option<StudyPlan>,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self {
            logged_hours: 0.0,
            weekly_goal: DEFAULT_WEEKLY_GOAL,
            snapshots: Vec::new(),
            last_plan: None,
        }
    }
}

/// Auxiliary tools state. Currently only the revision timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsState {
    pub timeline: Vec<TimelineEntry>,
}

impl Default for ToolsState {
    fn default() -> Self {
        Self {
            timeline: TimelineEntry::canonical_defaults(),
        }
    }
}

impl ToolsState {
    /// Number of completed steps.
    pub fn completed_count(&self) -> usize {
        self.timeline.iter().filter(|entry| entry.completed).count()
    }
}

/// The persisted record for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub id: Uuid,
    pub user_id: String,
    pub planner: PlannerState,
    pub tools: ToolsState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    /// A fresh record with full defaults.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            planner: PlannerState::default(),
            tools: ToolsState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The public `{planner, tools}` projection.
    pub fn view(&self) -> StateView {
        StateView {
            planner: self.planner.clone(),
            tools: self.tools.clone(),
        }
    }
}

/// Response body of `GET /api/state/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    pub planner: PlannerState,
    pub tools: ToolsState,
}

/// Partial planner update. Fields stay loosely typed until sanitized;
/// JSON `null` deserializes to `None` and counts as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_hours: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_goal: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_plan: Option<serde_json::Value>,
}

/// Partial tools update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<serde_json::Value>,
}

/// What to do with a `lastPlan` that is present but fails sanitization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanMergePolicy {
    /// Leave the stored plan untouched.
    #[default]
    SkipInvalid,
    /// Clear the stored plan.
    OverwriteWithNull,
}

impl FromStr for PlanMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip_invalid" => Ok(Self::SkipInvalid),
            "overwrite_with_null" => Ok(Self::OverwriteWithNull),
            other => Err(format!(
                "unknown plan policy {other:?} (expected skip_invalid or overwrite_with_null)"
            )),
        }
    }
}
