//! Entity types for zen.
//!
//! Projects own an ordered list of tasks plus two note collections. All
//! timestamps are stored as epoch milliseconds and field names are
//! camelCase so existing `zen-db.json` files load unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Task or project priority class.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(Error::InvalidArgument(format!(
                "invalid priority '{s}': must be high, normal, or low"
            ))),
        }
    }
}

/// Rough size of a task.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Quick,
    #[default]
    Medium,
    Long,
}

impl Effort {
    pub const ALL: [Effort; 3] = [Effort::Quick, Effort::Medium, Effort::Long];

    pub fn as_str(self) -> &'static str {
        match self {
            Effort::Quick => "quick",
            Effort::Medium => "medium",
            Effort::Long => "long",
        }
    }

    /// Default duration estimate in hours when no history exists.
    pub fn default_hours(self) -> f64 {
        match self {
            Effort::Quick => 5.0 / 60.0,
            Effort::Medium => 0.5,
            Effort::Long => 2.0,
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effort {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Effort::Quick),
            "medium" => Ok(Effort::Medium),
            "long" => Ok(Effort::Long),
            _ => Err(Error::InvalidArgument(format!(
                "invalid effort '{s}': must be quick, medium, or long"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub text: String,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub author: String,
}

/// Free-text item in one of a project's note collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteItem {
    pub id: u64,
    pub content: String,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

/// Which of the two note collections an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Note,
    Account,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub is_done: bool,
    pub priority: Priority,
    pub effort: Effort,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub points_earned: u32,
    /// Minutes actually spent.
    #[serde(default)]
    pub time_spent: u32,
    /// Minutes predicted.
    #[serde(default)]
    pub predicted_time: u32,
}

impl Task {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        priority: Priority,
        effort: Effort,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            is_done: false,
            priority,
            effort,
            created_at: now,
            completed_at: None,
            due_date: None,
            comments: Vec::new(),
            points_earned: 0,
            time_spent: 0,
            predicted_time: 0,
        }
    }

    /// Set the completion state. `completed_at` and `points_earned` are
    /// only kept while the task is done.
    pub fn set_done(&mut self, done: bool, completed_at: Option<DateTime<Utc>>, points: u32) {
        self.is_done = done;
        if done {
            self.completed_at = completed_at;
            self.points_earned = points;
        } else {
            self.completed_at = None;
            self.points_earned = 0;
        }
    }

    /// Whether a completion at `at` meets the due date (no due date counts).
    pub fn on_time_at(&self, at: DateTime<Utc>) -> bool {
        self.due_date.map_or(true, |due| at <= due)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_done && self.due_date.is_some_and(|due| now > due)
    }
}

/// A client or project grouping tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub priority: Priority,
    #[serde(default)]
    pub notes: Vec<NoteItem>,
    #[serde(default)]
    pub accounts: Vec<NoteItem>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_completion_date: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: u64, name: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            notes: Vec::new(),
            accounts: Vec::new(),
            tasks: Vec::new(),
            created_at: now,
            target_completion_date: None,
        }
    }

    pub fn task(&self, task_id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    pub fn task_index(&self, task_id: u64) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == task_id)
    }

    pub fn notes_of(&self, kind: NoteKind) -> &Vec<NoteItem> {
        match kind {
            NoteKind::Note => &self.notes,
            NoteKind::Account => &self.accounts,
        }
    }

    pub fn notes_of_mut(&mut self, kind: NoteKind) -> &mut Vec<NoteItem> {
        match kind {
            NoteKind::Note => &mut self.notes,
            NoteKind::Account => &mut self.accounts,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_done).count()
    }
}

/// A tracked block of focused work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: u64,
    #[serde(rename = "clientId")]
    pub project_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    #[serde(with = "ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(
        default,
        with = "ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: u64,
    #[serde(default)]
    pub was_completed: bool,
}

impl FocusSession {
    pub fn minutes(&self) -> f64 {
        self.duration as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_serializes_with_camel_case_millis() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut task = Task::new(1, "Write report", Priority::High, Effort::Quick, now);
        task.set_done(true, Some(now), 45);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["isDone"], true);
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
        assert_eq!(value["completedAt"], 1_700_000_000_000i64);
        assert_eq!(value["pointsEarned"], 45);
        assert!(value.get("dueDate").is_none());
    }

    #[test]
    fn reopening_clears_completion_fields() {
        let now = Utc::now();
        let mut task = Task::new(1, "t", Priority::Low, Effort::Long, now);
        task.set_done(true, Some(now), 10);
        task.set_done(false, Some(now), 10);
        assert!(!task.is_done);
        assert!(task.completed_at.is_none());
        assert_eq!(task.points_earned, 0);
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!("quick".parse::<Effort>().unwrap(), Effort::Quick);
    }

    #[test]
    fn focus_session_uses_client_id_key() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let session = FocusSession {
            id: 5,
            project_id: 9,
            task_id: None,
            start_time: now,
            end_time: None,
            duration: 120,
            was_completed: false,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["clientId"], 9);
        assert_eq!(value["startTime"], 1_000);
        assert_eq!(session.minutes(), 2.0);
    }
}
