//! Pure projections of the session state into display values.

use crate::planner::model::{MAX_HOURS, MAX_SNAPSHOTS};
use crate::planner::{Confidence, PlannerState, Snapshot, StudyPlan, ToolsState};

use super::session::effective_goal;

/// Shown in place of a plan until the form has been submitted.
pub const PLAN_PROMPT: &str = "Fill in the form to get a personalised routine.";

/// Weekly hours progress bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// Bar fill in [0, 100].
    pub percentage: f64,
    /// `"{logged} / {goal} hrs"`.
    pub label: String,
    /// Logged hours, zero-padded to two characters.
    pub hours_logged: String,
}

/// One checklist row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineItemView {
    pub index: usize,
    pub step: String,
    pub checked: bool,
}

/// The plan card.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanView {
    Empty { prompt: &'static str },
    Breakdown {
        heading: String,
        sessions: u32,
        minutes_per_session: u32,
        steps: Vec<String>,
    },
}

/// Everything the widget shows, derived from one session.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub progress: ProgressView,
    pub snapshots: Vec<String>,
    pub plan: PlanView,
    pub timeline: Vec<TimelineItemView>,
    pub timeline_percentage: f64,
}

/// Shown in the snapshot list until the user records a session.
pub fn fallback_snapshots() -> Vec<Snapshot> {
    [
        ("Mathematics", "Past paper drills", 6.0),
        ("Science", "Diagrams & labelling", 4.0),
        ("English", "Essay practice", 3.0),
    ]
    .into_iter()
    .map(|(subject, topic, hours)| Snapshot {
        subject: subject.into(),
        topic: topic.into(),
        hours,
    })
    .collect()
}

fn clamp_hours(hours: f64) -> f64 {
    if hours.is_finite() {
        hours.clamp(0.0, MAX_HOURS)
    } else {
        0.0
    }
}

pub fn weekly_progress(planner: &PlannerState) -> ProgressView {
    let goal = effective_goal(planner);
    let logged = clamp_hours(planner.logged_hours).min(goal);
    let percentage = (logged / goal * 100.0).min(100.0);
    ProgressView {
        percentage,
        label: format!("{logged} / {goal} hrs"),
        hours_logged: format!("{:0>2}", logged.to_string()),
    }
}

/// Share of completed checklist steps, in [0, 100].
pub fn timeline_progress(tools: &ToolsState) -> f64 {
    let total = tools.timeline.len().max(1);
    tools.completed_count() as f64 / total as f64 * 100.0
}

pub fn timeline_items(tools: &ToolsState) -> Vec<TimelineItemView> {
    tools
        .timeline
        .iter()
        .enumerate()
        .map(|(index, entry)| TimelineItemView {
            index,
            step: entry.step.clone(),
            checked: entry.completed,
        })
        .collect()
}

/// Snapshot lines, falling back to sample sessions when none are recorded.
pub fn snapshot_lines(snapshots: &[Snapshot]) -> Vec<String> {
    let fallback;
    let source = if snapshots.is_empty() {
        fallback = fallback_snapshots();
        fallback.as_slice()
    } else {
        snapshots
    };
    source
        .iter()
        .take(MAX_SNAPSHOTS)
        .map(|s| format!("{} · {} · {} hrs", s.subject, s.topic, s.hours))
        .collect()
}

pub fn confidence_advice(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "Confidence low → add extra recap day.",
        Confidence::Medium => "Confidence medium → close with a timed drill.",
        Confidence::High => "Confidence high → turn last session into teaching.",
    }
}

/// Split a plan into sessions of roughly two hours, never fewer than two.
pub fn plan_view(plan: Option<&StudyPlan>) -> PlanView {
    let Some(plan) = plan else {
        return PlanView::Empty {
            prompt: PLAN_PROMPT,
        };
    };
    let hours = clamp_hours(plan.hours);
    let sessions = ((hours / 2.0).ceil() as u32).max(2);
    let minutes_per_session = (hours * 60.0 / f64::from(sessions)).round() as u32;
    PlanView::Breakdown {
        heading: format!("{} · {}", plan.subject, plan.topic),
        sessions,
        minutes_per_session,
        steps: vec![
            format!("Break it into {sessions} sessions of {minutes_per_session} minutes."),
            "Start with 10-minute recall, then deep practice, end with reflection.".to_string(),
            confidence_advice(plan.confidence).to_string(),
        ],
    }
}

pub fn widget_view(planner: &PlannerState, tools: &ToolsState) -> WidgetView {
    WidgetView {
        progress: weekly_progress(planner),
        snapshots: snapshot_lines(&planner.snapshots),
        plan: plan_view(planner.last_plan.as_ref()),
        timeline: timeline_items(tools),
        timeline_percentage: timeline_progress(tools),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_caps_at_goal() {
        let planner = PlannerState {
            logged_hours: 25.0,
            ..PlannerState::default()
        };
        let view = weekly_progress(&planner);
        assert_eq!(view.percentage, 100.0);
        assert_eq!(view.label, "20 / 20 hrs");
        assert_eq!(view.hours_logged, "20");
    }

    #[test]
    fn progress_pads_single_digits() {
        let planner = PlannerState {
            logged_hours: 5.0,
            weekly_goal: 10.0,
            ..PlannerState::default()
        };
        let view = weekly_progress(&planner);
        assert_eq!(view.percentage, 50.0);
        assert_eq!(view.label, "5 / 10 hrs");
        assert_eq!(view.hours_logged, "05");
    }

    #[test]
    fn zero_goal_falls_back_to_default() {
        let planner = PlannerState {
            logged_hours: 4.0,
            weekly_goal: 0.0,
            ..PlannerState::default()
        };
        assert_eq!(weekly_progress(&planner).label, "4 / 20 hrs");
    }

    #[test]
    fn timeline_progress_counts_completed() {
        let mut tools = ToolsState::default();
        for entry in tools.timeline.iter_mut().take(3) {
            entry.completed = true;
        }
        assert_eq!(timeline_progress(&tools), 60.0);
        assert_eq!(timeline_progress(&ToolsState { timeline: Vec::new() }), 0.0);
    }

    #[test]
    fn snapshot_lines_use_fallback_when_empty() {
        let lines = snapshot_lines(&[]);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Mathematics · Past paper drills · 6 hrs");
    }

    #[test]
    fn snapshot_lines_format_fractional_hours() {
        let lines = snapshot_lines(&[Snapshot {
            subject: "ICT".into(),
            topic: "Logic gates".into(),
            hours: 1.5,
        }]);
        assert_eq!(lines, vec!["ICT · Logic gates · 1.5 hrs"]);
    }

    #[test]
    fn plan_breakdown_has_at_least_two_sessions() {
        let plan = StudyPlan {
            subject: "Math".into(),
            topic: "Algebra".into(),
            hours: 1.0,
            confidence: Confidence::Low,
        };
        match plan_view(Some(&plan)) {
            PlanView::Breakdown {
                heading,
                sessions,
                minutes_per_session,
                steps,
            } => {
                assert_eq!(heading, "Math · Algebra");
                assert_eq!(sessions, 2);
                assert_eq!(minutes_per_session, 30);
                assert_eq!(steps[2], "Confidence low → add extra recap day.");
            }
            other => panic!("expected breakdown, got {other:?}"),
        }
    }

    #[test]
    fn plan_breakdown_scales_with_hours() {
        let plan = StudyPlan {
            subject: "Science".into(),
            topic: "Chemistry".into(),
            hours: 7.0,
            confidence: Confidence::High,
        };
        let PlanView::Breakdown {
            sessions,
            minutes_per_session,
            ..
        } = plan_view(Some(&plan))
        else {
            panic!("expected breakdown");
        };
        assert_eq!(sessions, 4);
        assert_eq!(minutes_per_session, 105);
    }

    #[test]
    fn missing_plan_shows_prompt() {
        assert_eq!(
            plan_view(None),
            PlanView::Empty {
                prompt: PLAN_PROMPT
            }
        );
    }
}
