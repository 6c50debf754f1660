//! zen focus command implementations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{resolve_project, Context, FocusCommands};
use crate::error::{Error, Result};
use crate::model::FocusSession;
use crate::output::{emit_success, HumanOutput};
use crate::scoring;

#[derive(Serialize)]
struct FocusListOutput<'a> {
    total: usize,
    active: Option<&'a FocusSession>,
    sessions: Vec<&'a FocusSession>,
}

#[derive(Serialize)]
struct FocusNextOutput<'a> {
    suggestion: Option<scoring::FocusCandidate<'a>>,
}

pub fn run(ctx: &mut Context, command: FocusCommands, now: DateTime<Utc>) -> Result<()> {
    match command {
        FocusCommands::Start { project, task } => run_start(ctx, &project, task, now),
        FocusCommands::End { id, completed } => run_end(ctx, id, completed, now),
        FocusCommands::List { limit } => run_list(ctx, limit),
        FocusCommands::Next => run_next(ctx, now),
    }
}

fn run_start(ctx: &mut Context, reference: &str, task_id: Option<u64>, now: DateTime<Utc>) -> Result<()> {
    let project_id = resolve_project(&ctx.session, reference)?;
    let id = ctx
        .session
        .start_focus(project_id, task_id, now)
        .ok_or(Error::TaskNotFound {
            project: project_id,
            task: task_id.unwrap_or_default(),
        })?;
    ctx.save_sessions();

    let session = ctx
        .session
        .sessions()
        .iter()
        .find(|s| s.id == id)
        .ok_or(Error::SessionNotFound(id))?;
    let mut human = HumanOutput::new("Focus session started");
    human.push_summary("id", id.to_string());
    human.push_next_step("zen focus end --completed");
    emit_success(ctx.output, "focus start", session, Some(&human))
}

fn run_end(ctx: &mut Context, id: Option<u64>, completed: bool, now: DateTime<Utc>) -> Result<()> {
    let id = match id {
        Some(id) => id,
        None => ctx
            .session
            .active_focus()
            .map(|s| s.id)
            .ok_or_else(|| Error::InvalidArgument("no focus session is running".to_string()))?,
    };
    let session = ctx
        .session
        .end_focus(id, completed, now)
        .ok_or(Error::SessionNotFound(id))?;
    ctx.save_sessions();

    let mut human = HumanOutput::new("Focus session ended");
    human.push_summary("duration", format!("{:.1} min", session.minutes()));
    human.push_summary("completed", completed.to_string());
    emit_success(ctx.output, "focus end", &session, Some(&human))
}

fn run_list(ctx: &mut Context, limit: usize) -> Result<()> {
    let sessions: Vec<&FocusSession> = ctx.session.sessions().iter().rev().take(limit).collect();

    let mut human = HumanOutput::new("Focus sessions");
    human.push_summary("total", ctx.session.sessions().len().to_string());
    for session in &sessions {
        let state = match (session.end_time, session.was_completed) {
            (None, _) => "running",
            (Some(_), true) => "completed",
            (Some(_), false) => "ended",
        };
        human.push_detail(format!(
            "{} [{}] client {} {} {:.1} min",
            session.id,
            session.start_time.format("%Y-%m-%d %H:%M"),
            session.project_id,
            state,
            session.minutes()
        ));
    }

    let output = FocusListOutput {
        total: ctx.session.sessions().len(),
        active: ctx.session.active_focus(),
        sessions,
    };
    emit_success(ctx.output, "focus list", &output, Some(&human))
}

fn run_next(ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
    let suggestion = scoring::find_best_focus_task(ctx.session.projects(), now);

    let human = match &suggestion {
        Some(candidate) => {
            let mut human = HumanOutput::new(format!("Focus on: {}", candidate.task.title));
            human.push_summary("client", candidate.project_name);
            human.push_summary("score", format!("{:.0}", candidate.score));
            human.push_next_step(format!(
                "zen focus start {} --task {}",
                candidate.project_id, candidate.task.id
            ));
            human
        }
        None => HumanOutput::new("Nothing open to focus on"),
    };
    emit_success(ctx.output, "focus next", &FocusNextOutput { suggestion }, Some(&human))
}
