//! One application session.
//!
//! `Session` owns the entity store, the undo history, focus sessions and
//! the achievement ledger. Every reversible mutation goes through here so
//! that it is recorded exactly once; the store itself knows nothing about
//! history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::focus::FocusLog;
use crate::gamification::{
    self, check_achievements, Achievement, AchievementLedger, Level, LevelProgress,
};
use crate::history::{HistoryEntry, HistoryLog, HistoryOp};
use crate::model::{Comment, Effort, FocusSession, NoteItem, NoteKind, Priority, Project, Task};
use crate::stats::{compute_user_stats, UserStats};
use crate::store::{EntityStore, ProjectFields, TaskPatch, Toggle};
use crate::undo::{self, Direction};

/// A partial client edit. `target_completion_date: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub target_completion_date: Option<Option<DateTime<Utc>>>,
}

/// Everything the progress views show, derived in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct UserProgress {
    pub stats: UserStats,
    pub points: u32,
    pub level: Level,
    pub next_level_points: u32,
    pub level_progress: LevelProgress,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    store: EntityStore,
    history: HistoryLog,
    focus: FocusLog,
    ledger: AchievementLedger,
    dirty: bool,
}

impl Session {
    pub fn new(
        projects: Vec<Project>,
        sessions: Vec<FocusSession>,
        ledger: AchievementLedger,
        history_capacity: usize,
    ) -> Self {
        Self {
            store: EntityStore::from_projects(projects),
            history: HistoryLog::with_capacity(history_capacity),
            focus: FocusLog::from_sessions(sessions),
            ledger,
            dirty: false,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn projects(&self) -> &[Project] {
        self.store.projects()
    }

    pub fn sessions(&self) -> &[FocusSession] {
        self.focus.sessions()
    }

    pub fn ledger(&self) -> &AchievementLedger {
        &self.ledger
    }

    /// True when the store changed since the last `mark_clean`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn record(&mut self, op: HistoryOp, now: DateTime<Utc>) {
        let entry = HistoryEntry::new(op, now);
        debug!(kind = entry.op.kind(), description = %entry.description, "recorded");
        self.history.append(entry);
        self.dirty = true;
    }

    // Clients

    pub fn add_client(&mut self, name: &str, priority: Priority, now: DateTime<Utc>) -> Option<Project> {
        if name.trim().is_empty() {
            return None;
        }
        let project = self.store.add_project(name.trim(), priority, now);
        self.record(
            HistoryOp::ProjectAdd {
                project: project.clone(),
            },
            now,
        );
        Some(project)
    }

    pub fn remove_client(&mut self, id: u64, now: DateTime<Utc>) -> Option<Project> {
        let project = self.store.remove_project(id)?;
        self.record(
            HistoryOp::ProjectRemove {
                project: project.clone(),
            },
            now,
        );
        Some(project)
    }

    /// Returns the fields after the edit, or `None` when the client is
    /// missing, the name would be blank, or nothing changed.
    pub fn update_client(
        &mut self,
        id: u64,
        patch: &ClientPatch,
        now: DateTime<Utc>,
    ) -> Option<ProjectFields> {
        let before = self.store.project_fields(id)?;
        let mut after = before.clone();
        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            after.name = name.to_string();
        }
        if let Some(priority) = patch.priority {
            after.priority = priority;
        }
        if let Some(target) = patch.target_completion_date {
            after.target_completion_date = target;
        }
        if after == before {
            return None;
        }
        self.store.set_project_fields(id, &after);
        self.record(
            HistoryOp::ProjectUpdate {
                project_id: id,
                before,
                after: after.clone(),
            },
            now,
        );
        Some(after)
    }

    // Tasks

    pub fn add_task(
        &mut self,
        project_id: u64,
        title: &str,
        priority: Priority,
        effort: Effort,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let task = self.store.add_task(project_id, title, priority, effort, now)?;
        self.record(
            HistoryOp::TaskCreate {
                project_id,
                task: task.clone(),
            },
            now,
        );
        Some(task)
    }

    /// One task per distinct project, each undoable on its own.
    pub fn add_task_to_many(
        &mut self,
        project_ids: &[u64],
        title: &str,
        priority: Priority,
        effort: Effort,
        now: DateTime<Utc>,
    ) -> Vec<(u64, Task)> {
        let created = self
            .store
            .add_task_to_many(project_ids, title, priority, effort, now);
        for (project_id, task) in &created {
            self.record(
                HistoryOp::TaskCreate {
                    project_id: *project_id,
                    task: task.clone(),
                },
                now,
            );
        }
        created
    }

    pub fn delete_task(&mut self, project_id: u64, task_id: u64, now: DateTime<Utc>) -> Option<Task> {
        let (index, task) = self.store.delete_task(project_id, task_id)?;
        self.record(
            HistoryOp::TaskDelete {
                project_id,
                index,
                task: task.clone(),
            },
            now,
        );
        Some(task)
    }

    pub fn toggle_task(&mut self, project_id: u64, task_id: u64, now: DateTime<Utc>) -> Option<Toggle> {
        let toggle = self.store.toggle_task(project_id, task_id, now)?;
        self.record(
            HistoryOp::TaskToggle {
                project_id,
                task_id,
                done: toggle.done,
                completed_at: toggle.completed_at,
                points: toggle.points,
                previous_completed_at: toggle.previous_completed_at,
                previous_points: toggle.previous_points,
            },
            now,
        );
        Some(toggle)
    }

    pub fn update_task(
        &mut self,
        project_id: u64,
        task_id: u64,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let (before, after) = self.store.update_task(project_id, task_id, patch)?;
        self.record(
            HistoryOp::TaskUpdate {
                project_id,
                task_id,
                before,
                after,
            },
            now,
        );
        self.store.task(project_id, task_id).cloned()
    }

    /// Move `active_id` to the position of `over_id`.
    pub fn reorder_tasks(
        &mut self,
        project_id: u64,
        active_id: u64,
        over_id: u64,
        now: DateTime<Utc>,
    ) -> Option<(usize, usize)> {
        let (from, to) = self.store.reorder_tasks(project_id, active_id, over_id)?;
        self.record(HistoryOp::TaskReorder { project_id, from, to }, now);
        Some((from, to))
    }

    // Not recorded in history.

    pub fn add_comment(
        &mut self,
        project_id: u64,
        task_id: u64,
        text: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Option<Comment> {
        let comment = self.store.add_comment(project_id, task_id, text, author, now)?;
        self.dirty = true;
        Some(comment)
    }

    pub fn add_note(
        &mut self,
        project_id: u64,
        kind: NoteKind,
        content: &str,
        now: DateTime<Utc>,
    ) -> Option<NoteItem> {
        let item = self.store.add_note(project_id, kind, content, now)?;
        self.dirty = true;
        Some(item)
    }

    pub fn update_note(&mut self, project_id: u64, kind: NoteKind, note_id: u64, content: &str) -> bool {
        let updated = self.store.update_note(project_id, kind, note_id, content);
        self.dirty |= updated;
        updated
    }

    pub fn delete_note(&mut self, project_id: u64, kind: NoteKind, note_id: u64) -> Option<NoteItem> {
        let item = self.store.delete_note(project_id, kind, note_id)?;
        self.dirty = true;
        Some(item)
    }

    // Focus

    pub fn active_focus(&self) -> Option<&FocusSession> {
        self.focus.active()
    }

    pub fn start_focus(&mut self, project_id: u64, task_id: Option<u64>, now: DateTime<Utc>) -> Option<u64> {
        let exists = match task_id {
            Some(task_id) => self.store.task(project_id, task_id).is_some(),
            None => self.store.project(project_id).is_some(),
        };
        exists.then(|| self.focus.start(project_id, task_id, now))
    }

    /// End a running session. Its whole minutes are added to the task's
    /// time spent when the session was tied to a task.
    pub fn end_focus(&mut self, id: u64, completed: bool, now: DateTime<Utc>) -> Option<FocusSession> {
        let session = self.focus.end(id, completed, now)?.clone();
        if let Some(task_id) = session.task_id {
            let minutes = u32::try_from(session.duration / 60).unwrap_or(u32::MAX);
            let spent = self
                .store
                .task(session.project_id, task_id)
                .map(|task| task.time_spent.saturating_add(minutes));
            if let Some(spent) = spent {
                if minutes > 0 && self.store.set_time_spent(session.project_id, task_id, spent) {
                    self.dirty = true;
                }
            }
        }
        Some(session)
    }

    // History

    /// Step back over the last applied entry. `None` at the start of the log.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.move_back()?;
        if undo::apply(&mut self.store, &entry, Direction::Reverse) {
            self.dirty = true;
        }
        Some(entry)
    }

    /// Re-apply the next entry. `None` at the end of the log.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.move_forward()?;
        if undo::apply(&mut self.store, &entry, Direction::Forward) {
            self.dirty = true;
        }
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.history.cursor()
    }

    // Derived

    pub fn stats(&self, now: DateTime<Utc>) -> UserStats {
        compute_user_stats(self.store.projects(), self.focus.sessions(), now)
    }

    /// Stats, points, level and achievements. Does not record unlocks.
    pub fn progress(&self, now: DateTime<Utc>) -> UserProgress {
        let stats = self.stats(now);
        let points = gamification::total_points(self.store.projects());
        let level = gamification::level_by_points(points);
        let achievements = check_achievements(&stats, &self.ledger.achievements(), now);
        UserProgress {
            points,
            next_level_points: gamification::next_level_points(level.level),
            level_progress: gamification::progress_to_next_level(points, level.level),
            level,
            achievements,
            stats,
        }
    }

    /// Record unlocks reached by the current state and return the new ones.
    pub fn refresh_achievements(&mut self, now: DateTime<Utc>) -> Vec<Achievement> {
        let stats = self.stats(now);
        let (_, fresh) = self.ledger.evaluate(&stats, now);
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn session_with_client() -> (Session, u64) {
        let mut session = Session::default();
        let client = session.add_client("Acme", Priority::High, at(1_000)).unwrap();
        session.mark_clean();
        (session, client.id)
    }

    #[test]
    fn mutations_record_and_mark_dirty() {
        let (mut session, client) = session_with_client();
        assert!(!session.is_dirty());
        session
            .add_task(client, "Write brief", Priority::Normal, Effort::Quick, at(2_000))
            .unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.cursor(), Some(1));
    }

    #[test]
    fn no_op_mutations_are_not_recorded() {
        let (mut session, client) = session_with_client();
        assert!(session.add_task(client, "  ", Priority::Low, Effort::Long, at(2)).is_none());
        assert!(session.delete_task(client, 42, at(3)).is_none());
        assert!(session.toggle_task(999, 1, at(4)).is_none());
        assert!(session
            .update_client(client, &ClientPatch::default(), at(5))
            .is_none());
        assert_eq!(session.history().len(), 1);
        assert!(!session.is_dirty());
    }

    #[test]
    fn undo_then_redo_walks_the_log() {
        let (mut session, client) = session_with_client();
        let task = session
            .add_task(client, "Draft", Priority::High, Effort::Medium, at(2_000))
            .unwrap();
        session.toggle_task(client, task.id, at(3_000)).unwrap();
        let done = session.store().clone();

        assert_eq!(session.undo().unwrap().op.kind(), "task_toggle");
        assert!(!session.store().task(client, task.id).unwrap().is_done);
        assert_eq!(session.undo().unwrap().op.kind(), "task_create");
        assert!(session.store().task(client, task.id).is_none());

        session.redo().unwrap();
        session.redo().unwrap();
        assert_eq!(session.store(), &done);
        assert!(session.redo().is_none());
    }

    #[test]
    fn bulk_create_is_undone_one_project_at_a_time() {
        let (mut session, first) = session_with_client();
        let second = session.add_client("Globex", Priority::Low, at(1_500)).unwrap().id;
        let created =
            session.add_task_to_many(&[first, second, first], "Invoice", Priority::Normal, Effort::Quick, at(2_000));
        assert_eq!(created.len(), 2);

        session.undo().unwrap();
        assert_eq!(session.store().project(second).unwrap().tasks.len(), 0);
        assert_eq!(session.store().project(first).unwrap().tasks.len(), 1);
        session.undo().unwrap();
        assert_eq!(session.store().project(first).unwrap().tasks.len(), 0);
    }

    #[test]
    fn appending_after_undo_discards_redo() {
        let (mut session, client) = session_with_client();
        session.add_task(client, "a", Priority::Low, Effort::Quick, at(2)).unwrap();
        session.add_task(client, "b", Priority::Low, Effort::Quick, at(3)).unwrap();
        session.undo().unwrap();
        assert!(session.can_redo());

        session.add_task(client, "c", Priority::Low, Effort::Quick, at(4)).unwrap();
        assert!(!session.can_redo());
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn update_client_round_trips_through_history() {
        let (mut session, client) = session_with_client();
        let patch = ClientPatch {
            name: Some("Acme Corp".to_string()),
            ..ClientPatch::default()
        };
        session.update_client(client, &patch, at(2)).unwrap();
        assert_eq!(session.store().project(client).unwrap().name, "Acme Corp");
        session.undo().unwrap();
        assert_eq!(session.store().project(client).unwrap().name, "Acme");
    }

    #[test]
    fn focus_adds_minutes_to_the_task() {
        let (mut session, client) = session_with_client();
        let task = session
            .add_task(client, "Deep work", Priority::High, Effort::Long, at(2))
            .unwrap();
        let start = now();
        let id = session.start_focus(client, Some(task.id), start).unwrap();
        let ended = session
            .end_focus(id, true, start + Duration::seconds(25 * 60 + 30))
            .unwrap();
        assert_eq!(ended.duration, 25 * 60 + 30);
        assert_eq!(session.store().task(client, task.id).unwrap().time_spent, 25);
        assert!(session.end_focus(id, true, start + Duration::hours(1)).is_none());
    }

    #[test]
    fn focus_on_a_missing_task_does_not_start() {
        let (mut session, client) = session_with_client();
        assert!(session.start_focus(client, Some(77), now()).is_none());
        assert!(session.start_focus(999, None, now()).is_none());
        assert!(session.start_focus(client, None, now()).is_some());
    }

    #[test]
    fn unlocks_survive_undo() {
        let (mut session, client) = session_with_client();
        let task = session
            .add_task(client, "First", Priority::Normal, Effort::Quick, now())
            .unwrap();
        session.toggle_task(client, task.id, now()).unwrap();
        let fresh = session.refresh_achievements(now());
        assert!(fresh.iter().any(|a| a.id == "first_task"));

        session.undo().unwrap();
        assert!(session.refresh_achievements(now()).is_empty());
        let progress = session.progress(now());
        let first = progress
            .achievements
            .iter()
            .find(|a| a.id == "first_task")
            .unwrap();
        assert!(first.is_unlocked());
        assert_eq!(progress.stats.total_tasks_completed, 0);
    }

    #[test]
    fn progress_reports_points_and_level() {
        let (mut session, client) = session_with_client();
        for title in ["a", "b", "c", "d"] {
            let task = session
                .add_task(client, title, Priority::High, Effort::Quick, now())
                .unwrap();
            session.toggle_task(client, task.id, now()).unwrap();
        }
        let progress = session.progress(now());
        assert_eq!(progress.points, 4 * 45);
        assert_eq!(progress.level.level, 2);
        assert_eq!(progress.next_level_points, 300);
        assert_eq!(progress.level_progress.current, 80);
    }
}
