//! Aggregate statistics derived from projects and focus sessions.
//!
//! Everything here is recomputed from scratch on each call. Days are
//! bucketed by their UTC calendar date.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::model::{FocusSession, Priority, Project};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestDay {
    pub date: Option<NaiveDate>,
    pub tasks: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub total_tasks_completed: u32,
    pub current_streak: u32,
    pub max_streak: u32,
    /// Minutes across all sessions.
    pub total_focus_time: f64,
    pub tasks_this_week: u32,
    pub tasks_this_month: u32,
    pub perfect_days: u32,
    pub average_tasks_per_day: f64,
    pub best_day: BestDay,
    pub consistency_score: u32,
    /// Mean length of completed sessions, in minutes.
    pub avg_session_duration: f64,
    pub peak_performance_hours: Vec<u32>,
    pub hour_histogram: Vec<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
struct DayBucket {
    completed: u32,
    on_time: u32,
}

fn completion_days(projects: &[Project]) -> BTreeMap<NaiveDate, DayBucket> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for task in projects.iter().flat_map(|project| project.tasks.iter()) {
        if !task.is_done {
            continue;
        }
        let Some(completed_at) = task.completed_at else {
            continue;
        };
        let bucket = days.entry(completed_at.date_naive()).or_default();
        bucket.completed += 1;
        if task.on_time_at(completed_at) {
            bucket.on_time += 1;
        }
    }
    days
}

/// Consecutive days with completions ending today, or yesterday when
/// today has none yet.
fn current_streak(days: &BTreeMap<NaiveDate, DayBucket>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut day = if days.contains_key(&today) {
        today
    } else if days.contains_key(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while days.contains_key(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

fn longest_run(days: &BTreeMap<NaiveDate, DayBucket>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days.keys() {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

pub fn compute_user_stats(
    projects: &[Project],
    sessions: &[FocusSession],
    now: DateTime<Utc>,
) -> UserStats {
    let days = completion_days(projects);
    let today = now.date_naive();
    let week_start = today - Duration::days(6);
    let month_start = today - Duration::days(29);

    let mut stats = UserStats {
        hour_histogram: vec![0; 24],
        ..UserStats::default()
    };

    for (&day, bucket) in &days {
        stats.total_tasks_completed += bucket.completed;
        if day >= week_start && day <= today {
            stats.tasks_this_week += bucket.completed;
        }
        if day >= month_start && day <= today {
            stats.tasks_this_month += bucket.completed;
        }
        if bucket.completed > 0 && bucket.completed == bucket.on_time {
            stats.perfect_days += 1;
        }
        if bucket.completed > stats.best_day.tasks {
            stats.best_day = BestDay {
                date: Some(day),
                tasks: bucket.completed,
            };
        }
    }

    stats.current_streak = current_streak(&days, today);
    stats.max_streak = longest_run(&days).max(stats.current_streak);
    if !days.is_empty() {
        let average = f64::from(stats.total_tasks_completed) / days.len() as f64;
        stats.average_tasks_per_day = (average * 10.0).round() / 10.0;
        stats.consistency_score =
            ((f64::from(stats.current_streak) / 7.0 * 100.0).round() as u32).min(100);
    }

    stats.total_focus_time = sessions.iter().map(FocusSession::minutes).sum();
    let completed: Vec<&FocusSession> = sessions.iter().filter(|s| s.was_completed).collect();
    if !completed.is_empty() {
        let total: f64 = completed.iter().map(|s| s.minutes()).sum();
        stats.avg_session_duration = total / completed.len() as f64;
    }
    for session in &completed {
        stats.hour_histogram[session.start_time.hour() as usize] += 1;
    }
    let mut hours: Vec<(u32, u32)> = stats
        .hour_histogram
        .iter()
        .enumerate()
        .map(|(hour, &count)| (hour as u32, count))
        .filter(|&(_, count)| count > 0)
        .collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    stats.peak_performance_hours = hours.into_iter().take(3).map(|(hour, _)| hour).collect();

    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub tasks_completed: u32,
    pub points_earned: u32,
    /// Minutes.
    pub focus_time: f64,
    pub sessions_count: u32,
}

/// One entry per day for the `days` days ending at `today`, oldest first.
pub fn daily_stats(
    projects: &[Project],
    sessions: &[FocusSession],
    today: NaiveDate,
    days: u32,
) -> Vec<DailyStats> {
    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(i64::from(offset));
            let mut day = DailyStats {
                date,
                tasks_completed: 0,
                points_earned: 0,
                focus_time: 0.0,
                sessions_count: 0,
            };
            for task in projects.iter().flat_map(|p| p.tasks.iter()) {
                if task.is_done && task.completed_at.is_some_and(|at| at.date_naive() == date) {
                    day.tasks_completed += 1;
                    day.points_earned = day.points_earned.saturating_add(task.points_earned);
                }
            }
            for session in sessions.iter().filter(|s| s.start_time.date_naive() == date) {
                day.sessions_count += 1;
                day.focus_time += session.minutes();
            }
            day
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeekStats {
    pub week_start: Option<NaiveDate>,
    pub tasks_completed: u32,
    pub points_earned: u32,
    pub focus_minutes: u64,
    pub high_priority_done: u32,
    pub projects_worked_on: u32,
}

impl WeekStats {
    fn score(&self) -> f64 {
        f64::from(self.tasks_completed + self.high_priority_done * 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekTrend {
    Excellent,
    Good,
    NeedsAttention,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReview {
    pub this_week: WeekStats,
    pub last_week: WeekStats,
    pub trend: WeekTrend,
}

pub fn week_stats(projects: &[Project], sessions: &[FocusSession], week_start: NaiveDate) -> WeekStats {
    let week_end = week_start + Duration::days(7);
    let in_week = |at: DateTime<Utc>| {
        let day = at.date_naive();
        day >= week_start && day < week_end
    };

    let mut stats = WeekStats {
        week_start: Some(week_start),
        ..WeekStats::default()
    };
    let mut touched = HashSet::new();
    for project in projects {
        for task in &project.tasks {
            if !task.is_done || !task.completed_at.is_some_and(in_week) {
                continue;
            }
            stats.tasks_completed += 1;
            stats.points_earned = stats.points_earned.saturating_add(task.points_earned);
            if task.priority == Priority::High {
                stats.high_priority_done += 1;
            }
            touched.insert(project.id);
        }
    }
    stats.projects_worked_on = touched.len() as u32;
    stats.focus_minutes = sessions
        .iter()
        .filter(|s| in_week(s.start_time))
        .map(|s| (s.duration as f64 / 60.0).round() as u64)
        .fold(0u64, u64::saturating_add);
    stats
}

/// Compare the Monday-based week containing `now` with the one before it.
pub fn weekly_review(projects: &[Project], sessions: &[FocusSession], now: DateTime<Utc>) -> WeeklyReview {
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let this_week = week_stats(projects, sessions, monday);
    let last_week = week_stats(projects, sessions, monday - Duration::days(7));

    let (this_score, last_score) = (this_week.score(), last_week.score());
    let trend = if this_score > last_score * 1.2 {
        WeekTrend::Excellent
    } else if this_score >= last_score {
        WeekTrend::Good
    } else {
        WeekTrend::NeedsAttention
    };

    WeeklyReview {
        this_week,
        last_week,
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effort, Task};
    use chrono::TimeZone;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn done_task(id: u64, at: DateTime<Utc>) -> Task {
        let mut task = Task::new(id, format!("t{id}"), Priority::Normal, Effort::Medium, at);
        task.set_done(true, Some(at), 30);
        task
    }

    fn project_with(tasks: Vec<Task>) -> Project {
        let mut project = Project::new(1, "p", Priority::Normal, noon(2024, 1, 1));
        project.tasks = tasks;
        project
    }

    #[test]
    fn empty_inputs_give_zeroes() {
        let stats = compute_user_stats(&[], &[], noon(2024, 5, 10));
        assert_eq!(stats.total_tasks_completed, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.consistency_score, 0);
        assert_eq!(stats.hour_histogram.len(), 24);
        assert!(stats.peak_performance_hours.is_empty());
    }

    #[test]
    fn streak_counts_from_yesterday_when_today_is_empty() {
        let now = noon(2024, 5, 10);
        let project = project_with(vec![
            done_task(1, noon(2024, 5, 9)),
            done_task(2, noon(2024, 5, 8)),
        ]);
        let stats = compute_user_stats(&[project], &[], now);
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn max_streak_tracks_longest_run() {
        let now = noon(2024, 5, 20);
        let project = project_with(vec![
            done_task(1, noon(2024, 5, 1)),
            done_task(2, noon(2024, 5, 2)),
            done_task(3, noon(2024, 5, 3)),
            done_task(4, noon(2024, 5, 20)),
        ]);
        let stats = compute_user_stats(&[project], &[], now);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.max_streak, 3);
        assert_eq!(stats.consistency_score, 14);
    }

    #[test]
    fn late_completion_spoils_a_perfect_day() {
        let day = noon(2024, 5, 10);
        let mut late = done_task(2, day);
        late.due_date = Some(day - Duration::days(1));
        let project = project_with(vec![done_task(1, day), late, done_task(3, noon(2024, 5, 9))]);
        let stats = compute_user_stats(&[project], &[], day);
        assert_eq!(stats.perfect_days, 1);
        assert_eq!(stats.best_day.date, Some(day.date_naive()));
        assert_eq!(stats.best_day.tasks, 2);
        assert_eq!(stats.average_tasks_per_day, 1.5);
    }

    #[test]
    fn week_and_month_windows() {
        let now = noon(2024, 5, 31);
        let project = project_with(vec![
            done_task(1, noon(2024, 5, 31)),
            done_task(2, noon(2024, 5, 25)),
            done_task(3, noon(2024, 5, 24)),
            done_task(4, noon(2024, 5, 2)),
            done_task(5, noon(2024, 5, 1)),
        ]);
        let stats = compute_user_stats(&[project], &[], now);
        assert_eq!(stats.tasks_this_week, 2);
        assert_eq!(stats.tasks_this_month, 4);
    }

    #[test]
    fn sessions_feed_focus_metrics() {
        let sessions = vec![
            FocusSession {
                id: 1,
                project_id: 1,
                task_id: None,
                start_time: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
                end_time: None,
                duration: 1_800,
                was_completed: true,
            },
            FocusSession {
                id: 2,
                project_id: 1,
                task_id: None,
                start_time: Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap(),
                end_time: None,
                duration: 600,
                was_completed: false,
            },
        ];
        let stats = compute_user_stats(&[], &sessions, noon(2024, 5, 10));
        assert_eq!(stats.total_focus_time, 40.0);
        assert_eq!(stats.avg_session_duration, 30.0);
        assert_eq!(stats.peak_performance_hours, vec![9]);
        assert_eq!(stats.hour_histogram[9], 1);
    }

    #[test]
    fn daily_stats_cover_the_range_oldest_first() {
        let project = project_with(vec![done_task(1, noon(2024, 5, 10))]);
        let days = daily_stats(&[project], &[], noon(2024, 5, 10).date_naive(), 3);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, noon(2024, 5, 8).date_naive());
        assert_eq!(days[2].tasks_completed, 1);
        assert_eq!(days[2].points_earned, 30);
    }

    #[test]
    fn weekly_review_compares_monday_weeks() {
        // 2024-05-15 is a Wednesday.
        let now = noon(2024, 5, 15);
        let mut high = done_task(1, noon(2024, 5, 13));
        high.priority = Priority::High;
        let project = project_with(vec![high, done_task(2, noon(2024, 5, 8))]);
        let review = weekly_review(&[project], &[], now);
        assert_eq!(review.this_week.week_start, Some(noon(2024, 5, 13).date_naive()));
        assert_eq!(review.this_week.tasks_completed, 1);
        assert_eq!(review.this_week.high_priority_done, 1);
        assert_eq!(review.last_week.tasks_completed, 1);
        assert_eq!(review.trend, WeekTrend::Excellent);
    }

    #[test]
    fn weekly_review_flags_a_slower_week() {
        let now = noon(2024, 5, 15);
        let project = project_with(vec![
            done_task(1, noon(2024, 5, 7)),
            done_task(2, noon(2024, 5, 8)),
        ]);
        let review = weekly_review(&[project], &[], now);
        assert_eq!(review.trend, WeekTrend::NeedsAttention);
    }
}
