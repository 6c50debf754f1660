//! zen export command implementation.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::storage;

#[derive(Serialize)]
struct ExportOutput {
    path: PathBuf,
    projects: usize,
    tasks: usize,
}

pub fn run(ctx: &mut Context, out: Option<PathBuf>, now: DateTime<Utc>) -> Result<()> {
    let dest = match out {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let projects = ctx.session.projects();
    let path = storage::export(projects, &dest, now.date_naive())?;

    let output = ExportOutput {
        path,
        projects: projects.len(),
        tasks: projects.iter().map(|p| p.tasks.len()).sum(),
    };
    let mut human = HumanOutput::new(format!("Exported to {}", output.path.display()));
    human.push_summary("clients", output.projects.to_string());
    human.push_summary("tasks", output.tasks.to_string());
    emit_success(ctx.output, "export", &output, Some(&human))
}
