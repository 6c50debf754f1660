//! Pick the next task to focus on.
//!
//! Ordering: task priority, then quick wins, then project priority, then
//! age (older tasks drift up, capped at 30 days).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Effort, Priority, Project, Task};

const MAX_AGE_BONUS_DAYS: f64 = 30.0;

pub fn calculate_task_score(task: &Task, project: &Project, now: DateTime<Utc>) -> f64 {
    let mut score = match task.priority {
        Priority::High => 1000.0,
        Priority::Normal => 500.0,
        Priority::Low => 100.0,
    };

    if task.effort == Effort::Quick {
        score += match task.priority {
            Priority::High => 200.0,
            Priority::Normal => 100.0,
            Priority::Low => 0.0,
        };
    }

    score += match project.priority {
        Priority::High => 50.0,
        Priority::Normal => 20.0,
        Priority::Low => 0.0,
    };

    let age_days = (now - task.created_at).num_milliseconds() as f64 / 86_400_000.0;
    score + age_days.clamp(0.0, MAX_AGE_BONUS_DAYS)
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusCandidate<'a> {
    pub task: &'a Task,
    pub project_id: u64,
    pub project_name: &'a str,
    pub score: f64,
}

/// Highest scoring open task across all projects. Ties keep store order.
pub fn find_best_focus_task(projects: &[Project], now: DateTime<Utc>) -> Option<FocusCandidate<'_>> {
    let mut best: Option<FocusCandidate<'_>> = None;
    for project in projects {
        for task in project.tasks.iter().filter(|task| !task.is_done) {
            let score = calculate_task_score(task, project, now);
            if best.as_ref().map_or(true, |current| score > current.score) {
                best = Some(FocusCandidate {
                    task,
                    project_id: project.id,
                    project_name: &project.name,
                    score,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn quick_high_task_beats_plain_high() {
        let project = Project::new(1, "p", Priority::Low, now());
        let quick = Task::new(1, "q", Priority::High, Effort::Quick, now());
        let long = Task::new(2, "l", Priority::High, Effort::Long, now());
        assert_eq!(calculate_task_score(&quick, &project, now()), 1200.0);
        assert_eq!(calculate_task_score(&long, &project, now()), 1000.0);
    }

    #[test]
    fn age_bonus_is_capped() {
        let project = Project::new(1, "p", Priority::Normal, now());
        let ancient = Task::new(1, "old", Priority::Low, Effort::Long, now() - Duration::days(400));
        assert_eq!(calculate_task_score(&ancient, &project, now()), 150.0);
    }

    #[test]
    fn best_task_skips_completed_work() {
        let mut a = Project::new(1, "a", Priority::Low, now());
        let mut done = Task::new(10, "done", Priority::High, Effort::Quick, now());
        done.set_done(true, Some(now()), 45);
        a.tasks = vec![done, Task::new(11, "open", Priority::Normal, Effort::Medium, now())];
        let mut b = Project::new(2, "b", Priority::High, now());
        b.tasks = vec![Task::new(20, "low", Priority::Low, Effort::Quick, now())];

        let tasks = [a, b];
        let best = find_best_focus_task(&tasks, now()).unwrap();
        assert_eq!(best.task.id, 11);
        assert_eq!(best.project_id, 1);
        assert!(find_best_focus_task(&[], now()).is_none());
    }
}
