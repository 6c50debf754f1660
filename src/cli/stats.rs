//! zen stats, achievements, level, health, predict, review and daily.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{resolve_project, Context};
use crate::analytics;
use crate::error::{Error, Result};
use crate::gamification::{Achievement, Level, LevelProgress};
use crate::output::{emit_success, HumanOutput};
use crate::stats::{self, WeekStats, WeekTrend};

#[derive(Serialize)]
struct LevelOutput {
    points: u32,
    level: Level,
    next_level_points: u32,
    progress: LevelProgress,
}

#[derive(Serialize)]
struct AchievementsOutput {
    unlocked: usize,
    total: usize,
    achievements: Vec<Achievement>,
}

pub fn run_stats(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let stats = ctx.session.stats(now);

    let mut human = HumanOutput::new("Stats");
    human.push_summary("completed", stats.total_tasks_completed.to_string());
    human.push_summary(
        "streak",
        format!("{} days (best {})", stats.current_streak, stats.max_streak),
    );
    human.push_summary("this week", stats.tasks_this_week.to_string());
    human.push_summary("this month", stats.tasks_this_month.to_string());
    human.push_summary("perfect days", stats.perfect_days.to_string());
    human.push_summary("per day", format!("{:.1}", stats.average_tasks_per_day));
    human.push_summary("consistency", format!("{}%", stats.consistency_score));
    human.push_summary("focus", format!("{:.0} min", stats.total_focus_time));
    if let Some(date) = stats.best_day.date {
        human.push_detail(format!("best day: {date} ({} tasks)", stats.best_day.tasks));
    }
    if !stats.peak_performance_hours.is_empty() {
        let hours: Vec<String> = stats
            .peak_performance_hours
            .iter()
            .map(|h| format!("{h:02}:00"))
            .collect();
        human.push_detail(format!("peak hours: {}", hours.join(", ")));
    }
    emit_success(ctx.output, "stats", &stats, Some(&human))
}

pub fn run_achievements(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let achievements = ctx.session.progress(now).achievements;
    let unlocked = achievements.iter().filter(|a| a.is_unlocked()).count();

    let mut human = HumanOutput::new("Achievements");
    human.push_summary("unlocked", format!("{unlocked}/{}", achievements.len()));
    for achievement in &achievements {
        let mark = if achievement.is_unlocked() { "x" } else { " " };
        human.push_detail(format!(
            "[{mark}] {} - {} ({}/{})",
            achievement.name, achievement.description, achievement.progress, achievement.target
        ));
    }

    let output = AchievementsOutput {
        unlocked,
        total: achievements.len(),
        achievements,
    };
    emit_success(ctx.output, "achievements", &output, Some(&human))
}

pub fn run_level(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let progress = ctx.session.progress(now);

    let mut human = HumanOutput::new(format!(
        "Level {} {}",
        progress.level.level, progress.level.name
    ));
    human.push_summary("points", progress.points.to_string());
    if progress.level_progress.next > 0 {
        human.push_summary(
            "next level",
            format!(
                "{}/{} ({:.0}%)",
                progress.level_progress.current,
                progress.level_progress.next,
                progress.level_progress.percent
            ),
        );
    } else {
        human.push_summary("next level", "max level reached");
    }

    let output = LevelOutput {
        points: progress.points,
        level: progress.level,
        next_level_points: progress.next_level_points,
        progress: progress.level_progress,
    };
    emit_success(ctx.output, "level", &output, Some(&human))
}

pub fn run_health(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let stats = ctx.session.stats(now);
    let health = analytics::productivity_health(ctx.session.projects(), &stats, now);

    let mut human = HumanOutput::new(format!("Productivity health: {}/100", health.score));
    human.push_summary("level", format!("{:?}", health.level).to_lowercase());
    human.push_summary(
        "trend",
        format!(
            "{} ({:+.0}%)",
            format!("{:?}", health.trend.direction).to_lowercase(),
            health.trend.change
        ),
    );
    for factor in &health.factors {
        human.push_detail(format!(
            "{}: {:.0} (weight {:.1}) {}",
            factor.name, factor.score, factor.weight, factor.description
        ));
    }
    for recommendation in &health.recommendations {
        human.push_next_step(format!("{}: {}", recommendation.title, recommendation.description));
    }
    emit_success(ctx.output, "health", &health, Some(&human))
}

pub fn run_predict(ctx: &mut Context, reference: Option<&str>, now: DateTime<Utc>) -> Result<()> {
    let projects = ctx.session.projects();
    let predictions = match reference {
        Some(reference) => {
            let id = resolve_project(&ctx.session, reference)?;
            let project = ctx.session.store().project(id).ok_or(Error::ProjectNotFound(id))?;
            vec![analytics::predict_project(project, projects, now)]
        }
        None => analytics::predict_all(projects, now),
    };

    let mut human = HumanOutput::new("Time predictions");
    for prediction in &predictions {
        let name = ctx
            .session
            .store()
            .project(prediction.project_id)
            .map_or("?", |p| p.name.as_str());
        human.push_detail(format!(
            "{name}: {:.1}h remaining ({:.0}% confidence)",
            prediction.total_estimated_hours,
            prediction.confidence * 100.0
        ));
        if let Some(done) = prediction.milestones.last() {
            human.push_detail(format!(
                "  {} by {}",
                done.name,
                done.estimated_date.format("%Y-%m-%d")
            ));
        }
        for risk in &prediction.risk_factors {
            human.push_warning(format!("{name}: {}", risk.description));
        }
    }
    emit_success(ctx.output, "predict", &predictions, Some(&human))
}

fn week_line(label: &str, week: &WeekStats) -> String {
    format!(
        "{label}: {} tasks, {} points, {} focus min, {} high priority, {} clients",
        week.tasks_completed,
        week.points_earned,
        week.focus_minutes,
        week.high_priority_done,
        week.projects_worked_on
    )
}

pub fn run_review(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let review = stats::weekly_review(ctx.session.projects(), ctx.session.sessions(), now);

    let verdict = match review.trend {
        WeekTrend::Excellent => "excellent",
        WeekTrend::Good => "good",
        WeekTrend::NeedsAttention => "needs attention",
    };
    let mut human = HumanOutput::new(format!("Weekly review: {verdict}"));
    human.push_detail(week_line("this week", &review.this_week));
    human.push_detail(week_line("last week", &review.last_week));
    emit_success(ctx.output, "review", &review, Some(&human))
}

pub fn run_daily(ctx: &mut Context, days: u32, now: DateTime<Utc>) -> Result<()> {
    if days == 0 {
        return Err(Error::InvalidArgument("--days must be at least 1".to_string()));
    }
    let daily = stats::daily_stats(
        ctx.session.projects(),
        ctx.session.sessions(),
        now.date_naive(),
        days,
    );

    let mut human = HumanOutput::new(format!("Last {days} days"));
    for day in &daily {
        human.push_detail(format!(
            "{}: {} tasks, {} points, {:.0} focus min, {} sessions",
            day.date, day.tasks_completed, day.points_earned, day.focus_time, day.sessions_count
        ));
    }
    emit_success(ctx.output, "daily", &daily, Some(&human))
}
