//! Input sanitization for client-submitted planner and tools fields.
//!
//! Clients send loosely typed JSON (form values arrive as strings, stale
//! clients send old shapes), so every function here takes a raw
//! `serde_json::Value`, applies JavaScript-style coercion, and clamps the
//! result into its canonical shape. All functions are total.

use serde_json::Value;

use super::model::{
    Confidence, MAX_HOURS, MAX_SNAPSHOTS, MIN_WEEKLY_GOAL, SUBJECT_MAX_CHARS, Snapshot,
    StudyPlan, TIMELINE_STEPS, TOPIC_MAX_CHARS, TimelineEntry,
};

/// Coerce a value to a number the way `Number(v)` does for scalars,
/// including `0x`/`0o`/`0b` literals in text.
///
/// Returns NaN for values with no numeric reading (unparseable strings,
/// objects, and all arrays; `Number([7])` would give 7).
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                parse_numeric_text(trimmed)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn parse_numeric_text(text: &str) -> f64 {
    if let Some(n) = parse_radix_literal(text) {
        return n;
    }
    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

/// Unsigned `0x`, `0o` or `0b` integer literal. A prefix with no valid
/// digits reads as NaN.
fn parse_radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let value = digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    });
    Some(value.unwrap_or(f64::NAN))
}

/// Truthiness of a value as a JavaScript condition would see it.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a field, with falsy values reading as `""`.
pub fn coerce_text(value: &Value) -> String {
    if !is_truthy(value) {
        return String::new();
    }
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Null => String::new(),
    }
}

fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Trim then keep at most `max_chars` characters.
fn clean_text(value: Option<&Value>, max_chars: usize) -> String {
    let text = value.map(coerce_text).unwrap_or_default();
    text.trim().chars().take(max_chars).collect()
}

fn clamp_finite(value: &Value, min: f64) -> Option<f64> {
    let n = coerce_number(value);
    n.is_finite().then(|| n.clamp(min, MAX_HOURS))
}

/// Hours in [0, 200]; anything without a finite numeric reading is 0.
pub fn normalize_hours(value: &Value) -> f64 {
    clamp_finite(value, 0.0).unwrap_or(0.0)
}

/// Logged hours in [0, 200], or `None` when the value is not numeric.
pub fn clamp_logged_hours(value: &Value) -> Option<f64> {
    clamp_finite(value, 0.0)
}

/// Weekly goal in [1, 200], or `None` when the value is not numeric.
pub fn clamp_weekly_goal(value: &Value) -> Option<f64> {
    clamp_finite(value, MIN_WEEKLY_GOAL)
}

/// Up to five cleaned snapshots. Non-object entries are skipped before the
/// cap is applied.
pub fn sanitize_snapshot_list(pending: &Value) -> Vec<Snapshot> {
    let Some(items) = pending.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_SNAPSHOTS)
        .map(|item| Snapshot {
            subject: clean_text(item.get("subject"), SUBJECT_MAX_CHARS),
            topic: clean_text(item.get("topic"), TOPIC_MAX_CHARS),
            hours: normalize_hours(item.get("hours").unwrap_or(&Value::Null)),
        })
        .collect()
}

/// A cleaned plan, or `None` when the input is not an object or its subject
/// or topic is blank.
pub fn sanitize_plan(pending: &Value) -> Option<StudyPlan> {
    let plan = pending.as_object()?;
    let subject = clean_text(plan.get("subject"), SUBJECT_MAX_CHARS);
    let topic = clean_text(plan.get("topic"), TOPIC_MAX_CHARS);
    if subject.is_empty() || topic.is_empty() {
        return None;
    }
    let confidence = plan
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(Confidence::from_label)
        .unwrap_or_default();
    Some(StudyPlan {
        subject,
        topic,
        hours: normalize_hours(plan.get("hours").unwrap_or(&Value::Null)),
        confidence,
    })
}

/// One entry per canonical step, in canonical order. Unknown steps are
/// dropped and missing steps are incomplete.
pub fn sanitize_timeline(pending: &Value) -> Vec<TimelineEntry> {
    let items: &[Value] = pending.as_array().map(Vec::as_slice).unwrap_or(&[]);
    TIMELINE_STEPS
        .iter()
        .map(|step| {
            let completed = items
                .iter()
                .find(|item| item.get("step").and_then(Value::as_str) == Some(*step))
                .and_then(|item| item.get("completed"))
                .is_some_and(is_truthy);
            TimelineEntry {
                step: (*step).to_string(),
                completed,
            }
        })
        .collect()
}
