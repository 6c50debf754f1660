//! zen project command implementations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{format_date, parse_date, resolve_project, Context, ProjectCommands};
use crate::analytics::{self, ProjectStats};
use crate::error::{Error, Result};
use crate::model::{NoteItem, Priority, Project};
use crate::output::{emit_success, HumanOutput};
use crate::session::ClientPatch;
use crate::store::ProjectFields;

#[derive(Serialize)]
struct ProjectSummary {
    id: u64,
    name: String,
    priority: Priority,
    total_tasks: usize,
    completed_tasks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_completion_date: Option<DateTime<Utc>>,
}

impl ProjectSummary {
    fn of(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            priority: project.priority,
            total_tasks: project.tasks.len(),
            completed_tasks: project.completed_count(),
            target_completion_date: project.target_completion_date,
        }
    }
}

#[derive(Serialize)]
struct ProjectListOutput {
    total: usize,
    projects: Vec<ProjectSummary>,
}

#[derive(Serialize)]
struct ProjectShowOutput<'a> {
    project: ProjectSummary,
    stats: ProjectStats,
    notes: &'a [NoteItem],
    accounts: &'a [NoteItem],
}

#[derive(Serialize)]
struct ProjectChangeOutput {
    id: u64,
    fields: ProjectFields,
}

pub fn run(ctx: &mut Context, command: ProjectCommands, now: DateTime<Utc>) -> Result<()> {
    match command {
        ProjectCommands::Add { name, priority } => run_add(ctx, &name, priority, now),
        ProjectCommands::Rm { project } => run_rm(ctx, &project, now),
        ProjectCommands::List => run_list(ctx),
        ProjectCommands::Show { project } => run_show(ctx, &project, now),
        ProjectCommands::Priority { project, priority } => {
            let patch = ClientPatch {
                priority: Some(priority),
                ..ClientPatch::default()
            };
            run_update(ctx, "project priority", &project, &patch, now)
        }
        ProjectCommands::Rename { project, name } => {
            let patch = ClientPatch {
                name: Some(name),
                ..ClientPatch::default()
            };
            run_update(ctx, "project rename", &project, &patch, now)
        }
        ProjectCommands::Target { project, date } => {
            let patch = ClientPatch {
                target_completion_date: Some(parse_date(&date)?),
                ..ClientPatch::default()
            };
            run_update(ctx, "project target", &project, &patch, now)
        }
    }
}

fn run_add(ctx: &mut Context, name: &str, priority: Priority, now: DateTime<Utc>) -> Result<()> {
    let project = ctx
        .session
        .add_client(name, priority, now)
        .ok_or_else(|| Error::InvalidArgument("client name cannot be empty".to_string()))?;

    let mut human = HumanOutput::new(format!("Added client {}", project.name));
    human.push_summary("id", project.id.to_string());
    human.push_summary("priority", priority.to_string());
    human.push_next_step(format!("zen task add \"...\" --project {}", project.id));
    emit_success(ctx.output, "project add", &ProjectSummary::of(&project), Some(&human))
}

fn run_rm(ctx: &mut Context, reference: &str, now: DateTime<Utc>) -> Result<()> {
    let id = resolve_project(&ctx.session, reference)?;
    let project = ctx
        .session
        .remove_client(id, now)
        .ok_or(Error::ProjectNotFound(id))?;

    let mut human = HumanOutput::new(format!("Removed client {}", project.name));
    human.push_summary("id", project.id.to_string());
    human.push_summary("tasks removed", project.tasks.len().to_string());
    emit_success(ctx.output, "project rm", &ProjectSummary::of(&project), Some(&human))
}

fn run_list(ctx: &mut Context) -> Result<()> {
    let projects: Vec<ProjectSummary> = ctx.session.projects().iter().map(ProjectSummary::of).collect();

    let mut human = HumanOutput::new("Clients");
    human.push_summary("total", projects.len().to_string());
    for project in &projects {
        human.push_detail(format!(
            "[{}] {} {} ({}/{} done, target {})",
            project.priority,
            project.id,
            project.name,
            project.completed_tasks,
            project.total_tasks,
            format_date(project.target_completion_date),
        ));
    }
    if projects.is_empty() {
        human.push_next_step("zen project add <name>");
    }

    let output = ProjectListOutput {
        total: projects.len(),
        projects,
    };
    emit_success(ctx.output, "project list", &output, Some(&human))
}

fn run_show(ctx: &mut Context, reference: &str, now: DateTime<Utc>) -> Result<()> {
    let id = resolve_project(&ctx.session, reference)?;
    let project = ctx.session.store().project(id).ok_or(Error::ProjectNotFound(id))?;
    let stats = analytics::project_stats(project, now.date_naive());

    let mut human = HumanOutput::new(format!("Client {}", project.name));
    human.push_summary("id", project.id.to_string());
    human.push_summary("priority", project.priority.to_string());
    human.push_summary(
        "tasks",
        format!("{}/{} done", stats.completed_tasks, stats.total_tasks),
    );
    human.push_summary("avg completion", format!("{:.1}h", stats.avg_task_speed));
    human.push_summary("target", format_date(project.target_completion_date));
    for slice in &stats.priority_distribution {
        human.push_detail(format!(
            "{}: {} tasks ({:.0}%)",
            slice.priority, slice.count, slice.percentage
        ));
    }
    if let Some(last) = stats.burndown.last() {
        human.push_detail(format!("remaining today: {} (ideal {:.1})", last.actual, last.ideal));
    }
    for note in &project.notes {
        human.push_detail(format!("note {}: {}", note.id, note.content));
    }
    for account in &project.accounts {
        human.push_detail(format!("account {}: {}", account.id, account.content));
    }

    let output = ProjectShowOutput {
        project: ProjectSummary::of(project),
        stats,
        notes: &project.notes,
        accounts: &project.accounts,
    };
    emit_success(ctx.output, "project show", &output, Some(&human))
}

fn run_update(
    ctx: &mut Context,
    command: &str,
    reference: &str,
    patch: &ClientPatch,
    now: DateTime<Utc>,
) -> Result<()> {
    let id = resolve_project(&ctx.session, reference)?;
    let fields = match ctx.session.update_client(id, patch, now) {
        Some(fields) => fields,
        None if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) => {
            return Err(Error::InvalidArgument("client name cannot be empty".to_string()))
        }
        // Unchanged: report the current state.
        None => ctx
            .session
            .store()
            .project_fields(id)
            .ok_or(Error::ProjectNotFound(id))?,
    };

    let mut human = HumanOutput::new(format!("Updated client {}", fields.name));
    human.push_summary("id", id.to_string());
    human.push_summary("priority", fields.priority.to_string());
    human.push_summary("target", format_date(fields.target_completion_date));
    emit_success(ctx.output, command, &ProjectChangeOutput { id, fields }, Some(&human))
}
