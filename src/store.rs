//! The entity store: projects owning ordered tasks.
//!
//! Every mutator is a no-op on an absent target and reports that through
//! `Option`/`bool` rather than an error. Callers that need a message for
//! the user (the CLI) turn the absent result into an `Error` themselves.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::calculate_task_points;
use crate::model::{Comment, Effort, NoteItem, NoteKind, Priority, Project, Task};

/// Allocates opaque ids from the millisecond clock, never repeating.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    last: u64,
}

impl IdGen {
    /// Seed so that every id handed out is above `max_seen`.
    pub fn seeded(max_seen: u64) -> Self {
        Self { last: max_seen }
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last = millis.max(self.last.saturating_add(1));
        self.last
    }

    pub fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }
}

/// Editable project fields, captured before and after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFields {
    pub name: String,
    pub priority: Priority,
    pub target_completion_date: Option<DateTime<Utc>>,
}

impl ProjectFields {
    pub fn of(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            priority: project.priority,
            target_completion_date: project.target_completion_date,
        }
    }
}

/// Editable task fields, captured before and after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
    pub title: String,
    pub priority: Priority,
    pub effort: Effort,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskFields {
    pub fn of(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            priority: task.priority,
            effort: task.effort,
            due_date: task.due_date,
        }
    }
}

/// A partial task edit. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub effort: Option<Effort>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.priority.is_none()
            && self.effort.is_none()
            && self.due_date.is_none()
    }

    fn apply_to(&self, fields: &TaskFields) -> TaskFields {
        let mut next = fields.clone();
        if let Some(title) = &self.title {
            next.title = title.trim().to_string();
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(effort) = self.effort {
            next.effort = effort;
        }
        if let Some(due) = self.due_date {
            next.due_date = due;
        }
        next
    }
}

/// Result of flipping a task's completion flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Toggle {
    pub project_id: u64,
    pub task_id: u64,
    pub done: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub points: u32,
    pub previous_completed_at: Option<DateTime<Utc>>,
    pub previous_points: u32,
}

/// Ordered projects (canonical id order), each owning its ordered tasks.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    projects: Vec<Project>,
    ids: IdGen,
}

impl PartialEq for EntityStore {
    fn eq(&self, other: &Self) -> bool {
        self.projects == other.projects
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded projects. A repeated id keeps the first record.
    pub fn from_projects(mut projects: Vec<Project>) -> Self {
        projects.sort_by_key(|project| project.id);
        projects.dedup_by_key(|project| project.id);
        let mut ids = IdGen::default();
        for project in &projects {
            ids.observe(project.id);
            for item in project.notes.iter().chain(project.accounts.iter()) {
                ids.observe(item.id);
            }
            for task in &project.tasks {
                ids.observe(task.id);
                for comment in &task.comments {
                    ids.observe(comment.id);
                }
            }
        }
        Self { projects, ids }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn project(&self, id: u64) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    fn project_mut(&mut self, id: u64) -> Option<&mut Project> {
        self.projects.iter_mut().find(|project| project.id == id)
    }

    pub fn task(&self, project_id: u64, task_id: u64) -> Option<&Task> {
        self.project(project_id)?.task(task_id)
    }

    /// Every task paired with its owning project.
    pub fn tasks(&self) -> impl Iterator<Item = (&Project, &Task)> {
        self.projects
            .iter()
            .flat_map(|project| project.tasks.iter().map(move |task| (project, task)))
    }

    // Projects

    pub fn add_project(&mut self, name: &str, priority: Priority, now: DateTime<Utc>) -> Project {
        let id = self.ids.next(now);
        let project = Project::new(id, name.trim(), priority, now);
        self.insert_project(project.clone());
        project
    }

    /// Insert in id order. Returns false when the id is already present.
    pub fn insert_project(&mut self, project: Project) -> bool {
        match self.projects.binary_search_by_key(&project.id, |p| p.id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.observe(project.id);
                self.projects.insert(pos, project);
                true
            }
        }
    }

    pub fn remove_project(&mut self, id: u64) -> Option<Project> {
        let index = self.projects.iter().position(|project| project.id == id)?;
        Some(self.projects.remove(index))
    }

    pub fn project_fields(&self, id: u64) -> Option<ProjectFields> {
        self.project(id).map(ProjectFields::of)
    }

    pub fn set_project_fields(&mut self, id: u64, fields: &ProjectFields) -> bool {
        self.rename_project(id, &fields.name)
            && self.set_project_priority(id, fields.priority)
            && self.set_target_completion(id, fields.target_completion_date)
    }

    /// Callers trim and reject blank names before they get here.
    pub fn rename_project(&mut self, id: u64, name: &str) -> bool {
        match self.project_mut(id) {
            Some(project) => {
                project.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_project_priority(&mut self, id: u64, priority: Priority) -> bool {
        match self.project_mut(id) {
            Some(project) => {
                project.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn set_target_completion(&mut self, id: u64, target: Option<DateTime<Utc>>) -> bool {
        match self.project_mut(id) {
            Some(project) => {
                project.target_completion_date = target;
                true
            }
            None => false,
        }
    }

    // Tasks

    /// Create a task at the head of the project's list.
    pub fn add_task(
        &mut self,
        project_id: u64,
        title: &str,
        priority: Priority,
        effort: Effort,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let title = title.trim();
        if title.is_empty() || self.project(project_id).is_none() {
            return None;
        }
        let task = Task::new(self.ids.next(now), title, priority, effort, now);
        let project = self.project_mut(project_id)?;
        project.tasks.insert(0, task.clone());
        Some(task)
    }

    /// Create one task per distinct existing project, each with its own id.
    pub fn add_task_to_many(
        &mut self,
        project_ids: &[u64],
        title: &str,
        priority: Priority,
        effort: Effort,
        now: DateTime<Utc>,
    ) -> Vec<(u64, Task)> {
        let mut seen = HashSet::new();
        let mut created = Vec::new();
        for &project_id in project_ids {
            if !seen.insert(project_id) {
                continue;
            }
            if let Some(task) = self.add_task(project_id, title, priority, effort, now) {
                created.push((project_id, task));
            }
        }
        created
    }

    /// Insert a task at `index` (clamped). Returns false when the project is
    /// missing or already holds a task with that id.
    pub fn insert_task(&mut self, project_id: u64, index: usize, task: Task) -> bool {
        let Some(project) = self.project_mut(project_id) else {
            return false;
        };
        if project.task(task.id).is_some() {
            return false;
        }
        let index = index.min(project.tasks.len());
        project.tasks.insert(index, task);
        true
    }

    /// Remove a task, returning its former index alongside it.
    pub fn delete_task(&mut self, project_id: u64, task_id: u64) -> Option<(usize, Task)> {
        let project = self.project_mut(project_id)?;
        let index = project.task_index(task_id)?;
        Some((index, project.tasks.remove(index)))
    }

    /// Flip completion. Completing stamps `now` and awards points; reopening
    /// clears both.
    pub fn toggle_task(
        &mut self,
        project_id: u64,
        task_id: u64,
        now: DateTime<Utc>,
    ) -> Option<Toggle> {
        let task = self.project_mut(project_id)?.task_mut(task_id)?;
        let previous_completed_at = task.completed_at;
        let previous_points = task.points_earned;
        let done = !task.is_done;
        let (completed_at, points) = if done {
            let points = calculate_task_points(task.priority, task.effort, task.on_time_at(now));
            (Some(now), points)
        } else {
            (None, 0)
        };
        task.set_done(done, completed_at, points);
        Some(Toggle {
            project_id,
            task_id,
            done,
            completed_at,
            points,
            previous_completed_at,
            previous_points,
        })
    }

    pub fn set_task_done(
        &mut self,
        project_id: u64,
        task_id: u64,
        done: bool,
        completed_at: Option<DateTime<Utc>>,
        points: u32,
    ) -> bool {
        match self
            .project_mut(project_id)
            .and_then(|project| project.task_mut(task_id))
        {
            Some(task) => {
                task.set_done(done, completed_at, points);
                true
            }
            None => false,
        }
    }

    /// Move the `active_id` task to where `over_id` sits. Returns the
    /// (from, to) indices, or `None` when nothing moved.
    pub fn reorder_tasks(
        &mut self,
        project_id: u64,
        active_id: u64,
        over_id: u64,
    ) -> Option<(usize, usize)> {
        let project = self.project(project_id)?;
        let from = project.task_index(active_id)?;
        let to = project.task_index(over_id)?;
        if from == to {
            return None;
        }
        self.move_task(project_id, from, to).then_some((from, to))
    }

    pub fn move_task(&mut self, project_id: u64, from: usize, to: usize) -> bool {
        let Some(project) = self.project_mut(project_id) else {
            return false;
        };
        if from >= project.tasks.len() || to >= project.tasks.len() {
            return false;
        }
        let task = project.tasks.remove(from);
        project.tasks.insert(to, task);
        true
    }

    pub fn task_fields(&self, project_id: u64, task_id: u64) -> Option<TaskFields> {
        self.task(project_id, task_id).map(TaskFields::of)
    }

    pub fn set_task_fields(&mut self, project_id: u64, task_id: u64, fields: &TaskFields) -> bool {
        let Some(task) = self
            .project_mut(project_id)
            .and_then(|project| project.task_mut(task_id))
        else {
            return false;
        };
        task.title = fields.title.clone();
        task.priority = fields.priority;
        task.effort = fields.effort;
        task.due_date = fields.due_date;
        true
    }

    /// Apply a patch, returning the fields before and after. Empty titles
    /// and patches that change nothing are no-ops.
    pub fn update_task(
        &mut self,
        project_id: u64,
        task_id: u64,
        patch: &TaskPatch,
    ) -> Option<(TaskFields, TaskFields)> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return None;
        }
        let before = self.task_fields(project_id, task_id)?;
        let after = patch.apply_to(&before);
        if after == before {
            return None;
        }
        self.set_task_fields(project_id, task_id, &after);
        Some((before, after))
    }

    pub fn add_comment(
        &mut self,
        project_id: u64,
        task_id: u64,
        text: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Option<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.task(project_id, task_id)?;
        let comment = Comment {
            id: self.ids.next(now),
            text: text.to_string(),
            created_at: now,
            author: author.to_string(),
        };
        let task = self.project_mut(project_id)?.task_mut(task_id)?;
        task.comments.push(comment.clone());
        Some(comment)
    }

    pub fn set_time_spent(&mut self, project_id: u64, task_id: u64, minutes: u32) -> bool {
        match self
            .project_mut(project_id)
            .and_then(|project| project.task_mut(task_id))
        {
            Some(task) => {
                task.time_spent = minutes;
                true
            }
            None => false,
        }
    }

    // Notes and accounts

    pub fn add_note(
        &mut self,
        project_id: u64,
        kind: NoteKind,
        content: &str,
        now: DateTime<Utc>,
    ) -> Option<NoteItem> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        self.project(project_id)?;
        let item = NoteItem {
            id: self.ids.next(now),
            content: content.to_string(),
            created_at: now,
            is_pinned: None,
        };
        self.project_mut(project_id)?
            .notes_of_mut(kind)
            .insert(0, item.clone());
        Some(item)
    }

    pub fn update_note(&mut self, project_id: u64, kind: NoteKind, note_id: u64, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            return false;
        }
        let Some(project) = self.project_mut(project_id) else {
            return false;
        };
        match project.notes_of_mut(kind).iter_mut().find(|n| n.id == note_id) {
            Some(item) => {
                item.content = content.to_string();
                true
            }
            None => false,
        }
    }

    pub fn delete_note(&mut self, project_id: u64, kind: NoteKind, note_id: u64) -> Option<NoteItem> {
        let notes = self.project_mut(project_id)?.notes_of_mut(kind);
        let index = notes.iter().position(|n| n.id == note_id)?;
        Some(notes.remove(index))
    }
}
