//! Linear undo history.
//!
//! The log is an array plus a cursor. Entries before the cursor are
//! applied; entries after it can be redone. Appending after an undo drops
//! the redo side. The log keeps at most `capacity` entries, dropping the
//! oldest first.

use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{Project, Task};
use crate::store::{ProjectFields, TaskFields};

pub const DEFAULT_MAX_HISTORY: usize = 50;

/// A reversible mutation, carrying exactly what forward and reverse need.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryOp {
    ProjectAdd {
        project: Project,
    },
    ProjectRemove {
        project: Project,
    },
    ProjectUpdate {
        project_id: u64,
        before: ProjectFields,
        after: ProjectFields,
    },
    TaskCreate {
        project_id: u64,
        task: Task,
    },
    TaskDelete {
        project_id: u64,
        index: usize,
        task: Task,
    },
    TaskToggle {
        project_id: u64,
        task_id: u64,
        done: bool,
        #[serde(with = "ts_milliseconds_option")]
        completed_at: Option<DateTime<Utc>>,
        points: u32,
        #[serde(with = "ts_milliseconds_option")]
        previous_completed_at: Option<DateTime<Utc>>,
        previous_points: u32,
    },
    TaskUpdate {
        project_id: u64,
        task_id: u64,
        before: TaskFields,
        after: TaskFields,
    },
    TaskReorder {
        project_id: u64,
        from: usize,
        to: usize,
    },
}

impl HistoryOp {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryOp::ProjectAdd { .. } => "project_add",
            HistoryOp::ProjectRemove { .. } => "project_remove",
            HistoryOp::ProjectUpdate { .. } => "project_update",
            HistoryOp::TaskCreate { .. } => "task_create",
            HistoryOp::TaskDelete { .. } => "task_delete",
            HistoryOp::TaskToggle { .. } => "task_toggle",
            HistoryOp::TaskUpdate { .. } => "task_update",
            HistoryOp::TaskReorder { .. } => "task_reorder",
        }
    }

    pub fn project_id(&self) -> u64 {
        match self {
            HistoryOp::ProjectAdd { project } | HistoryOp::ProjectRemove { project } => project.id,
            HistoryOp::ProjectUpdate { project_id, .. }
            | HistoryOp::TaskCreate { project_id, .. }
            | HistoryOp::TaskDelete { project_id, .. }
            | HistoryOp::TaskToggle { project_id, .. }
            | HistoryOp::TaskUpdate { project_id, .. }
            | HistoryOp::TaskReorder { project_id, .. } => *project_id,
        }
    }

    pub fn task_id(&self) -> Option<u64> {
        match self {
            HistoryOp::TaskCreate { task, .. } | HistoryOp::TaskDelete { task, .. } => Some(task.id),
            HistoryOp::TaskToggle { task_id, .. } | HistoryOp::TaskUpdate { task_id, .. } => {
                Some(*task_id)
            }
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            HistoryOp::ProjectAdd { project } => format!("Add client \"{}\"", project.name),
            HistoryOp::ProjectRemove { project } => format!("Delete client \"{}\"", project.name),
            HistoryOp::ProjectUpdate { after, .. } => format!("Update client \"{}\"", after.name),
            HistoryOp::TaskCreate { task, .. } => format!("Add task \"{}\"", task.title),
            HistoryOp::TaskDelete { task, .. } => format!("Delete task \"{}\"", task.title),
            HistoryOp::TaskToggle { done: true, .. } => "Complete task".to_string(),
            HistoryOp::TaskToggle { done: false, .. } => "Reopen task".to_string(),
            HistoryOp::TaskUpdate { after, .. } => format!("Update task \"{}\"", after.title),
            HistoryOp::TaskReorder { from, to, .. } => format!("Move task {from} -> {to}"),
        }
    }
}

/// One recorded operation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub op: HistoryOp,
}

impl HistoryEntry {
    pub fn new(op: HistoryOp, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            description: op.describe(),
            op,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    /// Number of applied entries; the cursor is `applied - 1`.
    applied: usize,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.applied);
        self.entries.push(entry);
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
        self.applied = self.entries.len();
    }

    /// Step back over the most recently applied entry.
    pub fn move_back(&mut self) -> Option<HistoryEntry> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        Some(self.entries[self.applied].clone())
    }

    /// Step forward over the next redoable entry.
    pub fn move_forward(&mut self) -> Option<HistoryEntry> {
        let entry = self.entries.get(self.applied)?.clone();
        self.applied += 1;
        Some(entry)
    }

    /// Index of the last applied entry, `None` before the start.
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
