//! Per-project statistics, productivity health and time predictions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{Effort, Priority, Project, Task};
use crate::stats::UserStats;

/// Weekly deep-focus goal in hours.
const FOCUS_GOAL_HOURS: f64 = 10.0;
const BURNDOWN_DAYS: i64 = 30;
const THROUGHPUT_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityDistribution {
    pub priority: Priority,
    pub count: u32,
    pub percentage: f64,
    /// Mean minutes spent on completed tasks of this priority.
    pub avg_time_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub ideal: f64,
    pub actual: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub project_id: u64,
    pub project_name: String,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub burndown: Vec<BurndownPoint>,
    pub priority_distribution: Vec<PriorityDistribution>,
    /// Mean hours from creation to completion.
    pub avg_task_speed: f64,
    pub target_date: Option<NaiveDate>,
}

fn open_at_end_of(tasks: &[Task], day: NaiveDate) -> u32 {
    tasks
        .iter()
        .filter(|task| task.created_at.date_naive() <= day)
        .filter(|task| {
            !(task.is_done && task.completed_at.is_some_and(|at| at.date_naive() <= day))
        })
        .count() as u32
}

/// Remaining tasks for each of the last 30 days, with an ideal line that
/// reaches zero at the target date (or today when none is set).
pub fn burndown(project: &Project, today: NaiveDate) -> Vec<BurndownPoint> {
    let first = today - Duration::days(BURNDOWN_DAYS - 1);
    let start = open_at_end_of(&project.tasks, first);
    let finish = project
        .target_completion_date
        .map(|target| target.date_naive())
        .filter(|target| *target > first)
        .unwrap_or(today);
    let span = (finish - first).num_days().max(1) as f64;

    (0..BURNDOWN_DAYS)
        .map(|offset| {
            let date = first + Duration::days(offset);
            let ideal = (f64::from(start) * (1.0 - offset as f64 / span)).max(0.0);
            BurndownPoint {
                date,
                ideal: (ideal * 10.0).round() / 10.0,
                actual: open_at_end_of(&project.tasks, date),
            }
        })
        .collect()
}

pub fn project_stats(project: &Project, today: NaiveDate) -> ProjectStats {
    let total = project.tasks.len() as u32;
    let completed: Vec<&Task> = project.tasks.iter().filter(|task| task.is_done).collect();

    let priority_distribution = Priority::ALL
        .iter()
        .map(|&priority| {
            let count = project.tasks.iter().filter(|t| t.priority == priority).count() as u32;
            let done: Vec<&&Task> = completed.iter().filter(|t| t.priority == priority).collect();
            let spent: u64 = done.iter().map(|t| u64::from(t.time_spent)).sum();
            PriorityDistribution {
                priority,
                count,
                percentage: if total > 0 {
                    f64::from(count) / f64::from(total) * 100.0
                } else {
                    0.0
                },
                avg_time_spent: spent as f64 / done.len().max(1) as f64,
            }
        })
        .collect();

    let durations: Vec<f64> = completed
        .iter()
        .filter_map(|task| task.completed_at.map(|at| at - task.created_at))
        .map(|elapsed| elapsed.num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let avg_task_speed = if completed.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / completed.len() as f64
    };

    ProjectStats {
        project_id: project.id,
        project_name: project.name.clone(),
        total_tasks: total,
        completed_tasks: completed.len() as u32,
        burndown: burndown(project, today),
        priority_distribution,
        avg_task_speed,
        target_date: project.target_completion_date.map(|at| at.date_naive()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthFactor {
    pub name: &'static str,
    pub score: f64,
    pub weight: f64,
    pub status: FactorStatus,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthLevel::Excellent
        } else if score >= 60.0 {
            HealthLevel::Good
        } else if score >= 40.0 {
            HealthLevel::Warning
        } else {
            HealthLevel::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub kind: &'static str,
    pub priority: &'static str,
    pub title: &'static str,
    pub description: String,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthTrend {
    pub direction: TrendDirection,
    /// Percent change in completions, last 7 days against the 7 before.
    pub change: f64,
    pub next_week: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityHealth {
    pub score: u32,
    pub level: HealthLevel,
    pub factors: Vec<HealthFactor>,
    pub recommendations: Vec<Recommendation>,
    pub trend: HealthTrend,
}

fn completions_between(projects: &[Project], from: NaiveDate, to: NaiveDate) -> u32 {
    projects
        .iter()
        .flat_map(|project| project.tasks.iter())
        .filter(|task| task.is_done)
        .filter_map(|task| task.completed_at)
        .filter(|at| {
            let day = at.date_naive();
            day >= from && day <= to
        })
        .count() as u32
}

fn health_trend(projects: &[Project], score: f64, now: DateTime<Utc>) -> HealthTrend {
    let today = now.date_naive();
    let this_week = completions_between(projects, today - Duration::days(6), today);
    let last_week = completions_between(
        projects,
        today - Duration::days(13),
        today - Duration::days(7),
    );

    let change = match (this_week, last_week) {
        (0, 0) => 0.0,
        (_, 0) => 100.0,
        (current, before) => (f64::from(current) - f64::from(before)) / f64::from(before) * 100.0,
    };
    let direction = if change > 10.0 {
        TrendDirection::Improving
    } else if change < -10.0 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };
    HealthTrend {
        direction,
        change: change.round(),
        next_week: (score + change.clamp(-10.0, 10.0)).clamp(0.0, 100.0).round(),
        confidence: if this_week > 0 && last_week > 0 { 0.7 } else { 0.4 },
    }
}

pub fn productivity_health(
    projects: &[Project],
    stats: &UserStats,
    now: DateTime<Utc>,
) -> ProductivityHealth {
    let consistency = f64::from(stats.consistency_score.min(100));
    let focus_hours = stats.total_focus_time / 60.0;
    let focus = (focus_hours / FOCUS_GOAL_HOURS * 100.0).min(100.0);

    let factors = vec![
        HealthFactor {
            name: "consistency",
            score: consistency,
            weight: 0.3,
            status: if consistency >= 70.0 {
                FactorStatus::Positive
            } else if consistency >= 40.0 {
                FactorStatus::Neutral
            } else {
                FactorStatus::Negative
            },
            description: format!("{}% of planned days kept", consistency.round()),
        },
        HealthFactor {
            name: "deep_focus",
            score: focus,
            weight: 0.4,
            status: if focus >= 80.0 {
                FactorStatus::Positive
            } else if focus >= 50.0 {
                FactorStatus::Neutral
            } else {
                FactorStatus::Negative
            },
            description: format!("{} hours of focus", focus_hours.round()),
        },
    ];
    let weight: f64 = factors.iter().map(|f| f.weight).sum();
    let score = factors.iter().map(|f| f.score * f.weight).sum::<f64>() / weight;

    let mut recommendations = Vec::new();
    if consistency < 50.0 {
        recommendations.push(Recommendation {
            id: "improve_consistency",
            kind: "schedule",
            priority: "high",
            title: "Improve consistency",
            description: "Try to finish at least one task every day".to_string(),
            action: "Plan a task for tomorrow",
        });
    }
    if focus < 50.0 {
        recommendations.push(Recommendation {
            id: "more_focus",
            kind: "planning",
            priority: "medium",
            title: "Protect focus time",
            description: format!("Aim for {FOCUS_GOAL_HOURS} hours of focused work"),
            action: "Start a focus session",
        });
    }
    let overdue = projects
        .iter()
        .flat_map(|p| p.tasks.iter())
        .filter(|t| t.is_overdue(now))
        .count();
    if overdue > 0 {
        recommendations.push(Recommendation {
            id: "clear_overdue",
            kind: "task_management",
            priority: "high",
            title: "Clear overdue tasks",
            description: format!("{overdue} task(s) are past their due date"),
            action: "Reschedule or finish overdue tasks",
        });
    }

    ProductivityHealth {
        score: score.round() as u32,
        level: HealthLevel::from_score(score),
        factors,
        recommendations,
        trend: health_trend(projects, score, now),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTypePrediction {
    pub priority: Priority,
    pub effort: Effort,
    pub count: u32,
    pub avg_hours_per_task: f64,
    pub total_hours: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestonePrediction {
    pub name: String,
    pub estimated_date: DateTime<Utc>,
    pub tasks_completed: u32,
    pub total_tasks: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskKind {
    Overdue,
    Complexity,
    Capacity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub kind: RiskKind,
    pub description: String,
    pub impact: &'static str,
    pub probability: f64,
    pub mitigation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePrediction {
    pub project_id: u64,
    pub total_estimated_hours: f64,
    pub confidence: f64,
    pub breakdown: Vec<TaskTypePrediction>,
    pub milestones: Vec<MilestonePrediction>,
    pub risk_factors: Vec<RiskFactor>,
}

fn sample_confidence(samples: usize) -> f64 {
    (0.3 + 0.1 * samples as f64).min(0.9)
}

/// Estimate remaining work for `project`. Hours per task are learned from
/// completed tasks of the same priority and effort anywhere in `all`.
pub fn predict_project(project: &Project, all: &[Project], now: DateTime<Utc>) -> TimePrediction {
    let history: Vec<&Task> = all
        .iter()
        .flat_map(|p| p.tasks.iter())
        .filter(|t| t.is_done && t.time_spent > 0)
        .collect();
    let remaining: Vec<&Task> = project.tasks.iter().filter(|t| !t.is_done).collect();

    let mut breakdown = Vec::new();
    for priority in Priority::ALL {
        for effort in Effort::ALL {
            let count = remaining
                .iter()
                .filter(|t| t.priority == priority && t.effort == effort)
                .count() as u32;
            if count == 0 {
                continue;
            }
            let samples: Vec<f64> = history
                .iter()
                .filter(|t| t.priority == priority && t.effort == effort)
                .map(|t| f64::from(t.time_spent) / 60.0)
                .collect();
            let avg = if samples.is_empty() {
                effort.default_hours()
            } else {
                samples.iter().sum::<f64>() / samples.len() as f64
            };
            breakdown.push(TaskTypePrediction {
                priority,
                effort,
                count,
                avg_hours_per_task: avg,
                total_hours: avg * f64::from(count),
                confidence: sample_confidence(samples.len()),
            });
        }
    }

    let remaining_count = remaining.len() as u32;
    let total_hours: f64 = breakdown.iter().map(|b| b.total_hours).sum();
    let confidence = if remaining_count == 0 {
        1.0
    } else {
        breakdown
            .iter()
            .map(|b| b.confidence * f64::from(b.count))
            .sum::<f64>()
            / f64::from(remaining_count)
    };

    let today = now.date_naive();
    let recent = completions_between(
        std::slice::from_ref(project),
        today - Duration::days(THROUGHPUT_DAYS - 1),
        today,
    );
    let per_day = if recent == 0 {
        1.0
    } else {
        f64::from(recent) / THROUGHPUT_DAYS as f64
    };

    let done = project.completed_count() as u32;
    let total = project.tasks.len() as u32;
    let mut milestones = Vec::new();
    if remaining_count > 0 {
        for (step, percent) in [25u32, 50, 75, 100].into_iter().enumerate() {
            let needed = (f64::from(remaining_count) * f64::from(percent) / 100.0).ceil();
            let days = (needed / per_day).ceil() as i64;
            milestones.push(MilestonePrediction {
                name: format!("{percent}%"),
                estimated_date: now + Duration::days(days),
                tasks_completed: done + needed as u32,
                total_tasks: total,
                confidence: confidence * (1.0 - 0.1 * step as f64),
            });
        }
    }

    let mut risk_factors = Vec::new();
    let overdue = remaining.iter().filter(|t| t.is_overdue(now)).count();
    if overdue > 0 {
        risk_factors.push(RiskFactor {
            kind: RiskKind::Overdue,
            description: format!("{overdue} overdue task(s)"),
            impact: if overdue >= 3 { "high" } else { "medium" },
            probability: 0.9,
            mitigation: "Finish or reschedule overdue tasks first",
        });
    }
    let long = remaining.iter().filter(|t| t.effort == Effort::Long).count();
    if remaining_count > 0 && long * 2 > remaining.len() {
        risk_factors.push(RiskFactor {
            kind: RiskKind::Complexity,
            description: format!("{long} of {remaining_count} remaining tasks are long"),
            impact: "medium",
            probability: 0.6,
            mitigation: "Split long tasks into smaller steps",
        });
    }
    if let (Some(target), Some(last)) = (project.target_completion_date, milestones.last()) {
        if last.estimated_date > target {
            risk_factors.push(RiskFactor {
                kind: RiskKind::Capacity,
                description: "Current pace finishes after the target date".to_string(),
                impact: "high",
                probability: 0.8,
                mitigation: "Reduce scope or move the target date",
            });
        }
    }

    TimePrediction {
        project_id: project.id,
        total_estimated_hours: total_hours,
        confidence,
        breakdown,
        milestones,
        risk_factors,
    }
}

pub fn predict_all(projects: &[Project], now: DateTime<Utc>) -> Vec<TimePrediction> {
    projects
        .iter()
        .map(|project| predict_project(project, projects, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn task(id: u64, priority: Priority, effort: Effort, created: DateTime<Utc>) -> Task {
        Task::new(id, format!("t{id}"), priority, effort, created)
    }

    #[test]
    fn project_stats_distribution_and_speed() {
        let created = noon(2024, 5, 1);
        let mut project = Project::new(1, "Acme", Priority::High, created);
        let mut done = task(1, Priority::High, Effort::Quick, created);
        done.set_done(true, Some(created + Duration::hours(6)), 45);
        done.time_spent = 30;
        project.tasks = vec![
            done,
            task(2, Priority::High, Effort::Long, created),
            task(3, Priority::Low, Effort::Medium, created),
            task(4, Priority::Normal, Effort::Medium, created),
        ];

        let stats = project_stats(&project, noon(2024, 5, 10).date_naive());
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.avg_task_speed, 6.0);
        let high = &stats.priority_distribution[0];
        assert_eq!(high.count, 2);
        assert_eq!(high.percentage, 50.0);
        assert_eq!(high.avg_time_spent, 30.0);
        assert_eq!(stats.burndown.len(), 30);
    }

    #[test]
    fn burndown_tracks_remaining_and_reaches_zero_ideal() {
        let today = noon(2024, 5, 30).date_naive();
        let created = noon(2024, 4, 1);
        let mut project = Project::new(1, "p", Priority::Normal, created);
        let mut finished = task(1, Priority::Low, Effort::Quick, created);
        finished.set_done(true, Some(noon(2024, 5, 20)), 15);
        project.tasks = vec![finished, task(2, Priority::Low, Effort::Quick, created)];

        let points = burndown(&project, today);
        assert_eq!(points[0].actual, 2);
        assert_eq!(points[0].ideal, 2.0);
        assert_eq!(points.last().unwrap().actual, 1);
        assert_eq!(points.last().unwrap().ideal, 0.0);
    }

    #[test]
    fn health_levels_follow_thresholds() {
        assert_eq!(HealthLevel::from_score(80.0), HealthLevel::Excellent);
        assert_eq!(HealthLevel::from_score(60.0), HealthLevel::Good);
        assert_eq!(HealthLevel::from_score(40.0), HealthLevel::Warning);
        assert_eq!(HealthLevel::from_score(39.9), HealthLevel::Critical);
    }

    #[test]
    fn health_weights_consistency_and_focus() {
        let stats = UserStats {
            consistency_score: 100,
            total_focus_time: 600.0,
            ..UserStats::default()
        };
        let health = productivity_health(&[], &stats, noon(2024, 5, 10));
        assert_eq!(health.score, 100);
        assert_eq!(health.level, HealthLevel::Excellent);
        assert!(health.recommendations.is_empty());

        let idle = productivity_health(&[], &UserStats::default(), noon(2024, 5, 10));
        assert_eq!(idle.score, 0);
        assert_eq!(idle.level, HealthLevel::Critical);
        assert_eq!(idle.recommendations.len(), 2);
        assert_eq!(idle.trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn predictions_learn_from_completed_history() {
        let now = noon(2024, 5, 10);
        let mut project = Project::new(1, "p", Priority::Normal, now);
        let mut learned = task(1, Priority::High, Effort::Long, now);
        learned.set_done(true, Some(now), 30);
        learned.time_spent = 240;
        project.tasks = vec![
            learned,
            task(2, Priority::High, Effort::Long, now),
            task(3, Priority::Low, Effort::Medium, now),
        ];

        let prediction = predict_project(&project, std::slice::from_ref(&project), now);
        assert_eq!(prediction.breakdown.len(), 2);
        let high_long = &prediction.breakdown[0];
        assert_eq!(high_long.avg_hours_per_task, 4.0);
        assert!((high_long.confidence - 0.4).abs() < 1e-9);
        let low_medium = &prediction.breakdown[1];
        assert_eq!(low_medium.avg_hours_per_task, 0.5);
        assert_eq!(prediction.total_estimated_hours, 4.5);
        assert_eq!(prediction.milestones.len(), 4);
        assert_eq!(prediction.milestones[3].tasks_completed, 3);
    }

    #[test]
    fn overdue_work_is_a_risk() {
        let now = noon(2024, 5, 10);
        let mut project = Project::new(1, "p", Priority::Normal, now);
        let mut late = task(1, Priority::High, Effort::Quick, now - Duration::days(5));
        late.due_date = Some(now - Duration::days(1));
        project.tasks = vec![late];
        let prediction = predict_project(&project, std::slice::from_ref(&project), now);
        assert!(prediction
            .risk_factors
            .iter()
            .any(|risk| risk.kind == RiskKind::Overdue));
    }
}
