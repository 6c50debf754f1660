//! Record-level validation of loaded JSON.
//!
//! Each stored record is checked on its own. A record that fails is
//! dropped and counted; the rest of the payload still loads. Missing
//! optional fields take defaults and unknown fields are ignored.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::model::{Comment, Effort, FocusSession, NoteItem, Priority, Project, Task};

const DEFAULT_AUTHOR: &str = "You";

/// Largest id a stored record may carry: the biggest integer that JSON
/// numbers hold exactly. Anything above is treated as corrupt.
pub const MAX_ID: u64 = 9_007_199_254_740_991;

/// Records that survived validation and how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

fn millis(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let ms = value?.as_f64()?;
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}

fn id(value: Option<&Value>) -> Option<u64> {
    let id = match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.is_finite()).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id <= MAX_ID)
}

fn record_id(value: Option<&Value>) -> Option<u64> {
    value?.as_u64().filter(|id| *id <= MAX_ID)
}

fn priority(value: Option<&Value>) -> Priority {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn effort(value: Option<&Value>) -> Effort {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn u32_or_zero(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_f64)
        .filter(|f| f.is_finite() && *f > 0.0)
        .map_or(0, |f| f.min(f64::from(u32::MAX)) as u32)
}

fn comment(value: &Value) -> Option<Comment> {
    let obj = value.as_object()?;
    Some(Comment {
        id: id(obj.get("id"))?,
        text: obj.get("text")?.as_str()?.to_string(),
        created_at: millis(obj.get("createdAt"))?,
        author: obj
            .get("author")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_AUTHOR)
            .to_string(),
    })
}

fn note_item(value: &Value) -> Option<NoteItem> {
    let obj = value.as_object()?;
    Some(NoteItem {
        id: id(obj.get("id"))?,
        content: obj.get("content")?.as_str()?.to_string(),
        created_at: millis(obj.get("createdAt"))?,
        is_pinned: obj.get("isPinned").and_then(Value::as_bool),
    })
}

/// Note collections are arrays of items; older files stored a single
/// string, which becomes one item.
fn note_items(
    obj: &Map<String, Value>,
    key: &str,
    legacy_key: &str,
    legacy_id: u64,
    now: DateTime<Utc>,
) -> Vec<NoteItem> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(note_item).collect(),
        _ => obj
            .get(legacy_key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|content| {
                vec![NoteItem {
                    id: legacy_id,
                    content: content.to_string(),
                    created_at: now,
                    is_pinned: None,
                }]
            })
            .unwrap_or_default(),
    }
}

/// A task needs a numeric id, a title, a completion flag, and both a
/// priority and an effort.
pub fn task(value: &Value, now: DateTime<Utc>) -> Option<Task> {
    let obj = value.as_object()?;
    let id = record_id(obj.get("id"))?;
    let title = obj.get("title")?.as_str()?.to_string();
    let is_done = obj.get("isDone")?.as_bool()?;
    let priority_value = obj.get("priority").filter(|v| !v.is_null())?;
    let effort_value = obj.get("effort").filter(|v| !v.is_null())?;

    let mut task = Task::new(
        id,
        title,
        priority(Some(priority_value)),
        effort(Some(effort_value)),
        millis(obj.get("createdAt")).unwrap_or(now),
    );
    task.due_date = millis(obj.get("dueDate"));
    task.comments = obj
        .get("comments")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(comment).collect())
        .unwrap_or_default();
    task.time_spent = u32_or_zero(obj.get("timeSpent"));
    task.predicted_time = u32_or_zero(obj.get("predictedTime"));

    if is_done {
        let completed_at = millis(obj.get("completedAt")).unwrap_or(task.created_at);
        task.set_done(true, Some(completed_at), u32_or_zero(obj.get("pointsEarned")));
    }
    Some(task)
}

/// A project needs a numeric id and a name. Invalid tasks inside it are
/// dropped individually and reported through `dropped_tasks`.
pub fn project(value: &Value, now: DateTime<Utc>, dropped_tasks: &mut usize) -> Option<Project> {
    let obj = value.as_object()?;
    let id = record_id(obj.get("id"))?;
    let name = obj.get("name")?.as_str()?.to_string();

    let raw_tasks = obj.get("tasks").and_then(Value::as_array);
    let mut tasks: Vec<Task> = Vec::new();
    let mut seen = HashSet::new();
    for raw in raw_tasks.into_iter().flatten() {
        match task(raw, now) {
            Some(task) if seen.insert(task.id) => tasks.push(task),
            _ => *dropped_tasks += 1,
        }
    }

    let created_at = millis(obj.get("createdAt")).unwrap_or(now);
    let legacy_id = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    Some(Project {
        id,
        name,
        priority: priority(obj.get("priority")),
        notes: note_items(obj, "notes", "notes", legacy_id, now),
        accounts: note_items(obj, "accounts", "accounts_notes", legacy_id + 1, now),
        tasks,
        created_at,
        target_completion_date: millis(obj.get("targetCompletionDate")),
    })
}

/// Normalize a stored project array. A payload that is not an array
/// yields nothing. A repeated project id keeps the first record.
pub fn projects(value: &Value, now: DateTime<Utc>) -> (Normalized<Project>, usize) {
    let mut dropped_tasks = 0;
    let mut records = Vec::new();
    let mut dropped = 0;
    let mut seen = HashSet::new();
    for raw in value.as_array().into_iter().flatten() {
        match project(raw, now, &mut dropped_tasks) {
            Some(project) if seen.insert(project.id) => records.push(project),
            _ => dropped += 1,
        }
    }
    (Normalized { records, dropped }, dropped_tasks)
}

/// A session needs an id, a project id, and numeric start time and
/// duration.
pub fn session(value: &Value) -> Option<FocusSession> {
    let obj = value.as_object()?;
    let duration = obj.get("duration")?.as_f64().filter(|d| *d >= 0.0)?;
    Some(FocusSession {
        id: id(obj.get("id"))?,
        project_id: id(obj.get("clientId"))?,
        task_id: id(obj.get("taskId")),
        start_time: millis(obj.get("startTime"))?,
        end_time: millis(obj.get("endTime")),
        duration: duration as u64,
        was_completed: obj
            .get("wasCompleted")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

pub fn sessions(value: &Value) -> Normalized<FocusSession> {
    let mut records = Vec::new();
    let mut dropped = 0;
    for raw in value.as_array().into_iter().flatten() {
        match session(raw) {
            Some(session) => records.push(session),
            None => dropped += 1,
        }
    }
    Normalized { records, dropped }
}
