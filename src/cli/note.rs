//! zen note command implementations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{note_kind, resolve_project, Context, NoteCommands};
use crate::error::{Error, Result};
use crate::model::{NoteItem, NoteKind};
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct NoteOutput {
    project_id: u64,
    kind: NoteKind,
    note: NoteItem,
}

#[derive(Serialize)]
struct NoteListOutput<'a> {
    project_id: u64,
    kind: NoteKind,
    notes: &'a [NoteItem],
}

fn label(kind: NoteKind) -> &'static str {
    match kind {
        NoteKind::Note => "note",
        NoteKind::Account => "account note",
    }
}

fn missing(note_id: u64) -> Error {
    Error::InvalidArgument(format!("note {note_id} not found"))
}

pub fn run(ctx: &mut Context, command: NoteCommands, now: DateTime<Utc>) -> Result<()> {
    match command {
        NoteCommands::Add {
            project,
            content,
            account,
        } => {
            let kind = note_kind(account);
            let project_id = resolve_project(&ctx.session, &project)?;
            let note = ctx
                .session
                .add_note(project_id, kind, &content, now)
                .ok_or_else(|| Error::InvalidArgument("note cannot be empty".to_string()))?;

            let mut human = HumanOutput::new(format!("Added {}", label(kind)));
            human.push_summary("id", note.id.to_string());
            emit_success(
                ctx.output,
                "note add",
                &NoteOutput {
                    project_id,
                    kind,
                    note,
                },
                Some(&human),
            )
        }
        NoteCommands::Edit {
            project,
            note,
            content,
            account,
        } => {
            let kind = note_kind(account);
            let project_id = resolve_project(&ctx.session, &project)?;
            if content.trim().is_empty() {
                return Err(Error::InvalidArgument("note cannot be empty".to_string()));
            }
            if !ctx.session.update_note(project_id, kind, note, &content) {
                return Err(missing(note));
            }
            let item = ctx
                .session
                .store()
                .project(project_id)
                .and_then(|p| p.notes_of(kind).iter().find(|n| n.id == note).cloned())
                .ok_or_else(|| missing(note))?;

            let human = HumanOutput::new(format!("Updated {} {note}", label(kind)));
            emit_success(
                ctx.output,
                "note edit",
                &NoteOutput {
                    project_id,
                    kind,
                    note: item,
                },
                Some(&human),
            )
        }
        NoteCommands::Rm {
            project,
            note,
            account,
        } => {
            let kind = note_kind(account);
            let project_id = resolve_project(&ctx.session, &project)?;
            let item = ctx
                .session
                .delete_note(project_id, kind, note)
                .ok_or_else(|| missing(note))?;

            let human = HumanOutput::new(format!("Deleted {} {note}", label(kind)));
            emit_success(
                ctx.output,
                "note rm",
                &NoteOutput {
                    project_id,
                    kind,
                    note: item,
                },
                Some(&human),
            )
        }
        NoteCommands::List { project, account } => {
            let kind = note_kind(account);
            let project_id = resolve_project(&ctx.session, &project)?;
            let project = ctx
                .session
                .store()
                .project(project_id)
                .ok_or(Error::ProjectNotFound(project_id))?;
            let notes = project.notes_of(kind);

            let mut human = HumanOutput::new(format!("{} for {}", label(kind), project.name));
            human.push_summary("total", notes.len().to_string());
            for item in notes {
                let pin = if item.is_pinned == Some(true) { " (pinned)" } else { "" };
                human.push_detail(format!(
                    "{} [{}]{pin} {}",
                    item.id,
                    item.created_at.format("%Y-%m-%d"),
                    item.content
                ));
            }
            emit_success(
                ctx.output,
                "note list",
                &NoteListOutput {
                    project_id,
                    kind,
                    notes,
                },
                Some(&human),
            )
        }
    }
}
