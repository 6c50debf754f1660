//! Points, levels and achievements.
//!
//! Achievement unlocks are monotonic: once an entry has an `unlocked_at`
//! it keeps it, even when the underlying stat later drops (for example
//! after an undo).

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Effort, Priority, Project};
use crate::stats::UserStats;

pub fn priority_points(priority: Priority) -> u32 {
    match priority {
        Priority::High => 30,
        Priority::Normal => 20,
        Priority::Low => 10,
    }
}

/// Points for completing a task: priority base, +5 for quick tasks, +10
/// when finished on or before the due date.
pub fn calculate_task_points(priority: Priority, effort: Effort, on_time: bool) -> u32 {
    let mut points = priority_points(priority);
    if effort == Effort::Quick {
        points += 5;
    }
    if on_time {
        points += 10;
    }
    points
}

/// Sum of points earned by completed tasks, saturating at `u32::MAX`.
pub fn total_points(projects: &[Project]) -> u32 {
    projects
        .iter()
        .flat_map(|project| project.tasks.iter())
        .filter(|task| task.is_done)
        .fold(0u32, |total, task| total.saturating_add(task.points_earned))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    pub level: u32,
    pub name: &'static str,
    pub min_points: u32,
}

pub const LEVELS: [Level; 6] = [
    Level { level: 1, name: "Novice", min_points: 0 },
    Level { level: 2, name: "Apprentice", min_points: 100 },
    Level { level: 3, name: "Practitioner", min_points: 300 },
    Level { level: 4, name: "Master", min_points: 600 },
    Level { level: 5, name: "Legend", min_points: 1000 },
    Level { level: 6, name: "Guru", min_points: 1500 },
];

/// Highest level in `table` whose threshold does not exceed `points`.
/// `table` must be ascending and non-empty.
pub fn level_in(table: &[Level], points: u32) -> Level {
    let mut current = table[0];
    for level in table {
        if points >= level.min_points {
            current = *level;
        } else {
            break;
        }
    }
    current
}

pub fn level_by_points(points: u32) -> Level {
    level_in(&LEVELS, points)
}

/// Threshold of the level after `level`, or of `level` itself at the top.
pub fn next_level_points(level: u32) -> u32 {
    let find = |n: u32| LEVELS.iter().find(|l| l.level == n);
    find(level + 1)
        .or_else(|| find(level))
        .map_or(0, |l| l.min_points)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LevelProgress {
    /// Points earned inside the current level.
    pub current: u32,
    /// Points the current level spans.
    pub next: u32,
    pub percent: f64,
}

pub fn progress_to_next_level(points: u32, level: u32) -> LevelProgress {
    let find = |n: u32| LEVELS.iter().find(|l| l.level == n);
    let (Some(current), Some(next)) = (find(level), find(level + 1)) else {
        return LevelProgress::default();
    };
    let earned = points.saturating_sub(current.min_points);
    let span = next.min_points - current.min_points;
    LevelProgress {
        current: earned,
        next: span,
        percent: (f64::from(earned) / f64::from(span) * 100.0).min(100.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Tasks,
    Streak,
    Time,
    Special,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub target: u32,
    pub progress: u32,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    const fn locked(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        category: AchievementCategory,
        target: u32,
    ) -> Self {
        Self {
            id,
            name,
            description,
            category,
            target,
            progress: 0,
            unlocked_at: None,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// The fixed catalog, all locked with zero progress.
pub fn catalog() -> Vec<Achievement> {
    use AchievementCategory::*;
    vec![
        Achievement::locked("first_task", "First Blood", "Complete your first task", Tasks, 1),
        Achievement::locked("task_master_10", "Task Master", "Complete 10 tasks", Tasks, 10),
        Achievement::locked("task_master_50", "Task Legend", "Complete 50 tasks", Tasks, 50),
        Achievement::locked("task_master_100", "Task Overlord", "Complete 100 tasks", Tasks, 100),
        Achievement::locked("streak_3", "First Steps", "3 days in a row", Streak, 3),
        Achievement::locked("streak_7", "Week of Power", "7 days in a row", Streak, 7),
        Achievement::locked("streak_30", "Month of Mastery", "30 days in a row", Streak, 30),
        Achievement::locked("focus_60", "Focus Hour", "Spend 60 minutes in focus", Time, 60),
        Achievement::locked("focus_300", "Focus Master", "Spend 5 hours in focus", Time, 300),
        Achievement::locked("perfect_week", "Perfect Week", "7 days without a late task", Special, 7),
    ]
}

fn raw_progress(stats: &UserStats, category: AchievementCategory) -> u32 {
    match category {
        AchievementCategory::Tasks => stats.total_tasks_completed,
        AchievementCategory::Streak => stats.current_streak,
        AchievementCategory::Time => stats.total_focus_time.floor() as u32,
        AchievementCategory::Special => stats.perfect_days,
    }
}

/// Recompute progress for each achievement, clamped to its target, and
/// stamp `now` on first reaching the target. Existing unlocks are kept.
pub fn check_achievements(
    stats: &UserStats,
    achievements: &[Achievement],
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    achievements
        .iter()
        .map(|achievement| {
            let progress = raw_progress(stats, achievement.category);
            let unlocked_at = match achievement.unlocked_at {
                Some(at) => Some(at),
                None if progress >= achievement.target => Some(now),
                None => None,
            };
            Achievement {
                progress: progress.min(achievement.target),
                unlocked_at,
                ..achievement.clone()
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unlock {
    pub id: String,
    #[serde(with = "ts_milliseconds")]
    pub unlocked_at: DateTime<Utc>,
}

/// Persisted record of which achievements were unlocked and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementLedger {
    unlocks: Vec<Unlock>,
}

impl AchievementLedger {
    pub fn unlocked_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.unlocks
            .iter()
            .find(|unlock| unlock.id == id)
            .map(|unlock| unlock.unlocked_at)
    }

    pub fn len(&self) -> usize {
        self.unlocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unlocks.is_empty()
    }

    /// The catalog with recorded unlock times filled in.
    pub fn achievements(&self) -> Vec<Achievement> {
        catalog()
            .into_iter()
            .map(|mut achievement| {
                achievement.unlocked_at = self.unlocked_at(achievement.id);
                achievement
            })
            .collect()
    }

    /// Evaluate against `stats`, record new unlocks, and return the full
    /// list alongside the ones unlocked by this call.
    pub fn evaluate(
        &mut self,
        stats: &UserStats,
        now: DateTime<Utc>,
    ) -> (Vec<Achievement>, Vec<Achievement>) {
        let achievements = check_achievements(stats, &self.achievements(), now);
        let mut fresh = Vec::new();
        for achievement in &achievements {
            let Some(at) = achievement.unlocked_at else {
                continue;
            };
            if self.unlocked_at(achievement.id).is_none() {
                info!(achievement = achievement.id, "achievement unlocked");
                self.unlocks.push(Unlock {
                    id: achievement.id.to_string(),
                    unlocked_at: at,
                });
                fresh.push(achievement.clone());
            }
        }
        (achievements, fresh)
    }
}
