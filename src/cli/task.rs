//! zen task command implementations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{format_date, locate_task, parse_date, resolve_project, Context, TaskCommands};
use crate::error::{Error, Result};
use crate::model::{Comment, Effort, Priority, Task};
use crate::output::{emit_success, HumanOutput};
use crate::store::TaskPatch;

#[derive(Serialize)]
struct TaskRow<'a> {
    project_id: u64,
    project_name: &'a str,
    #[serde(flatten)]
    task: &'a Task,
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    total: usize,
    tasks: Vec<TaskRow<'a>>,
}

#[derive(Serialize)]
struct TaskCreateOutput {
    created: Vec<CreatedTask>,
}

#[derive(Serialize)]
struct CreatedTask {
    project_id: u64,
    task: Task,
}

#[derive(Serialize)]
struct TaskChangeOutput {
    project_id: u64,
    task: Task,
}

#[derive(Serialize)]
struct TaskToggleOutput {
    project_id: u64,
    task_id: u64,
    done: bool,
    points: u32,
}

#[derive(Serialize)]
struct TaskMoveOutput {
    project_id: u64,
    task_id: u64,
    from: usize,
    to: usize,
}

#[derive(Serialize)]
struct CommentOutput {
    project_id: u64,
    task_id: u64,
    comment: Comment,
}

pub fn run(ctx: &mut Context, command: TaskCommands, now: DateTime<Utc>) -> Result<()> {
    match command {
        TaskCommands::Add {
            title,
            projects,
            all,
            priority,
            effort,
        } => run_add(ctx, &title, &projects, all, priority, effort, now),
        TaskCommands::Rm { task } => run_rm(ctx, task, now),
        TaskCommands::Done { task } => run_done(ctx, task, now),
        TaskCommands::Edit {
            task,
            title,
            priority,
            effort,
            due,
        } => {
            let patch = TaskPatch {
                title,
                priority,
                effort,
                due_date: due.as_deref().map(parse_date).transpose()?,
            };
            run_edit(ctx, task, &patch, now)
        }
        TaskCommands::Move { task, to } => run_move(ctx, task, to, now),
        TaskCommands::Comment { task, text } => run_comment(ctx, task, &text, now),
        TaskCommands::List { project, open, done } => run_list(ctx, project.as_deref(), open, done),
    }
}

fn run_add(
    ctx: &mut Context,
    title: &str,
    references: &[String],
    all: bool,
    priority: Priority,
    effort: Effort,
    now: DateTime<Utc>,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
    }
    let project_ids: Vec<u64> = if all {
        ctx.session.projects().iter().map(|p| p.id).collect()
    } else {
        references
            .iter()
            .map(|reference| resolve_project(&ctx.session, reference))
            .collect::<Result<_>>()?
    };
    if project_ids.is_empty() {
        return Err(Error::InvalidArgument("no clients to add the task to".to_string()));
    }

    let created = ctx
        .session
        .add_task_to_many(&project_ids, title, priority, effort, now);

    let mut human = HumanOutput::new(match created.len() {
        1 => format!("Added task {}", title.trim()),
        n => format!("Added task {} to {n} clients", title.trim()),
    });
    for (project_id, task) in &created {
        human.push_detail(format!("{} in client {}", task.id, project_id));
    }
    if let [(_, task)] = created.as_slice() {
        human.push_next_step(format!("zen task done {}", task.id));
    }

    let output = TaskCreateOutput {
        created: created
            .into_iter()
            .map(|(project_id, task)| CreatedTask { project_id, task })
            .collect(),
    };
    emit_success(ctx.output, "task add", &output, Some(&human))
}

fn run_rm(ctx: &mut Context, task_id: u64, now: DateTime<Utc>) -> Result<()> {
    let project_id = locate_task(&ctx.session, task_id)?;
    let task = ctx
        .session
        .delete_task(project_id, task_id, now)
        .ok_or(Error::TaskNotFound {
            project: project_id,
            task: task_id,
        })?;

    let human = HumanOutput::new(format!("Deleted task {}", task.title));
    emit_success(ctx.output, "task rm", &TaskChangeOutput { project_id, task }, Some(&human))
}

fn run_done(ctx: &mut Context, task_id: u64, now: DateTime<Utc>) -> Result<()> {
    let project_id = locate_task(&ctx.session, task_id)?;
    let toggle = ctx
        .session
        .toggle_task(project_id, task_id, now)
        .ok_or(Error::TaskNotFound {
            project: project_id,
            task: task_id,
        })?;

    let human = if toggle.done {
        let mut human = HumanOutput::new("Task completed");
        human.push_summary("points", format!("+{}", toggle.points));
        human
    } else {
        HumanOutput::new("Task reopened")
    };
    let output = TaskToggleOutput {
        project_id,
        task_id,
        done: toggle.done,
        points: toggle.points,
    };
    emit_success(ctx.output, "task done", &output, Some(&human))
}

fn run_edit(ctx: &mut Context, task_id: u64, patch: &TaskPatch, now: DateTime<Utc>) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change (use --title, --priority, --effort or --due)".to_string(),
        ));
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
    }
    let project_id = locate_task(&ctx.session, task_id)?;
    let task = match ctx.session.update_task(project_id, task_id, patch, now) {
        Some(task) => task,
        None => ctx
            .session
            .store()
            .task(project_id, task_id)
            .cloned()
            .ok_or(Error::TaskNotFound {
                project: project_id,
                task: task_id,
            })?,
    };

    let mut human = HumanOutput::new(format!("Updated task {}", task.title));
    human.push_summary("priority", task.priority.to_string());
    human.push_summary("effort", task.effort.to_string());
    human.push_summary("due", format_date(task.due_date));
    emit_success(ctx.output, "task edit", &TaskChangeOutput { project_id, task }, Some(&human))
}

fn run_move(ctx: &mut Context, task_id: u64, over_id: u64, now: DateTime<Utc>) -> Result<()> {
    let project_id = locate_task(&ctx.session, task_id)?;
    if ctx.session.store().task(project_id, over_id).is_none() {
        return Err(Error::TaskNotFound {
            project: project_id,
            task: over_id,
        });
    }
    let (from, to) = ctx
        .session
        .reorder_tasks(project_id, task_id, over_id, now)
        .unwrap_or_else(|| {
            let index = ctx
                .session
                .store()
                .project(project_id)
                .and_then(|p| p.task_index(task_id))
                .unwrap_or(0);
            (index, index)
        });

    let human = HumanOutput::new(format!("Moved task from position {} to {}", from + 1, to + 1));
    let output = TaskMoveOutput {
        project_id,
        task_id,
        from,
        to,
    };
    emit_success(ctx.output, "task move", &output, Some(&human))
}

fn run_comment(ctx: &mut Context, task_id: u64, text: &str, now: DateTime<Utc>) -> Result<()> {
    let project_id = locate_task(&ctx.session, task_id)?;
    let author = ctx.config.user.comment_author.clone();
    let comment = ctx
        .session
        .add_comment(project_id, task_id, text, &author, now)
        .ok_or_else(|| Error::InvalidArgument("comment cannot be empty".to_string()))?;

    let human = HumanOutput::new(format!("{} commented on task {task_id}", comment.author));
    let output = CommentOutput {
        project_id,
        task_id,
        comment,
    };
    emit_success(ctx.output, "task comment", &output, Some(&human))
}

fn run_list(ctx: &mut Context, reference: Option<&str>, open: bool, done: bool) -> Result<()> {
    let project_filter = reference
        .map(|reference| resolve_project(&ctx.session, reference))
        .transpose()?;

    let tasks: Vec<TaskRow> = ctx
        .session
        .store()
        .tasks()
        .filter(|(project, _)| project_filter.map_or(true, |id| project.id == id))
        .filter(|(_, task)| !(open && task.is_done) && !(done && !task.is_done))
        .map(|(project, task)| TaskRow {
            project_id: project.id,
            project_name: &project.name,
            task,
        })
        .collect();

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("total", tasks.len().to_string());
    for row in &tasks {
        let mark = if row.task.is_done { "x" } else { " " };
        let mut line = format!(
            "[{mark}][{}][{}] {} {} ({})",
            row.task.priority, row.task.effort, row.task.id, row.task.title, row.project_name
        );
        if row.task.due_date.is_some() {
            line.push_str(&format!(" due {}", format_date(row.task.due_date)));
        }
        if !row.task.comments.is_empty() {
            line.push_str(&format!(" [{} comments]", row.task.comments.len()));
        }
        human.push_detail(line);
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(ctx.output, "task list", &output, Some(&human))
}
