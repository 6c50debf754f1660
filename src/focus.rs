//! Focus session tracking.

use chrono::{DateTime, Utc};

use crate::model::FocusSession;
use crate::store::IdGen;

#[derive(Debug, Clone, Default)]
pub struct FocusLog {
    sessions: Vec<FocusSession>,
    ids: IdGen,
}

impl FocusLog {
    pub fn from_sessions(sessions: Vec<FocusSession>) -> Self {
        let max_id = sessions.iter().map(|s| s.id).max().unwrap_or(0);
        Self {
            sessions,
            ids: IdGen::seeded(max_id),
        }
    }

    pub fn sessions(&self) -> &[FocusSession] {
        &self.sessions
    }

    /// The most recently started session that has not ended.
    pub fn active(&self) -> Option<&FocusSession> {
        self.sessions.iter().rev().find(|s| s.end_time.is_none())
    }

    pub fn start(&mut self, project_id: u64, task_id: Option<u64>, now: DateTime<Utc>) -> u64 {
        let id = self.ids.next(now);
        self.sessions.push(FocusSession {
            id,
            project_id,
            task_id,
            start_time: now,
            end_time: None,
            duration: 0,
            was_completed: false,
        });
        id
    }

    /// Close a running session; duration is whole seconds since start.
    /// Sessions that are unknown or already ended are left alone.
    pub fn end(&mut self, id: u64, completed: bool, now: DateTime<Utc>) -> Option<&FocusSession> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.end_time.is_none())?;
        let elapsed = (now - session.start_time).num_seconds().max(0);
        session.end_time = Some(now);
        session.duration = elapsed as u64;
        session.was_completed = completed;
        Some(session)
    }
}
