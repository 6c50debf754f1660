//! `zen shell`: an interactive session.
//!
//! The session stays in memory for the life of the shell, so undo/redo
//! work across commands. Store changes are handed to the debounced writer;
//! quitting (or end of input) flushes it.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::{execute, Context, CoreCommand};
use crate::error::{Error, Result};
use crate::history::HistoryEntry;
use crate::output::{command_name, emit_error, emit_success, HumanOutput};
use crate::writer::Writer;

#[derive(Parser, Debug)]
#[command(name = "zen", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    #[command(flatten)]
    Core(CoreCommand),

    /// Undo the last change
    Undo,

    /// Redo the last undone change
    Redo,

    /// Show the undo history
    History,

    /// Save and leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Serialize)]
struct StepOutput {
    entry: Option<HistoryEntry>,
    can_undo: bool,
    can_redo: bool,
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    cursor: Option<usize>,
    entries: &'a [HistoryEntry],
}

/// Split a line into words. Single quotes are literal; double quotes allow
/// backslash escapes.
pub(crate) fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(Error::InvalidArgument("unterminated quote".to_string())),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => current.push(c),
                            None => {
                                return Err(Error::InvalidArgument("unterminated quote".to_string()))
                            }
                        },
                        Some(c) => current.push(c),
                        None => return Err(Error::InvalidArgument("unterminated quote".to_string())),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    current.push(c);
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

pub fn run(ctx: Context) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop(ctx))
}

fn prompt(interactive: bool) -> Result<()> {
    if interactive {
        let mut stdout = std::io::stdout();
        write!(stdout, "zen> ")?;
        stdout.flush()?;
    }
    Ok(())
}

async fn run_loop(mut ctx: Context) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let gateway = Arc::new(ctx.storage.gateway());
    let writer = Writer::spawn(
        gateway,
        Duration::from_millis(ctx.config.storage.debounce_ms),
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt(interactive)?;
    while let Some(line) = lines.next_line().await? {
        let words = match split_words(&line) {
            Ok(words) => words,
            Err(err) => {
                emit_error("shell", &err, ctx.output.json)?;
                prompt(interactive)?;
                continue;
            }
        };
        if words.is_empty() {
            prompt(interactive)?;
            continue;
        }

        let command = command_name(&words);
        let now = Utc::now();
        let result = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => match parsed.command {
                ShellCommand::Quit => break,
                ShellCommand::Undo => step(&mut ctx, true),
                ShellCommand::Redo => step(&mut ctx, false),
                ShellCommand::History => show_history(&ctx),
                ShellCommand::Core(core) => execute(&mut ctx, core, now),
            },
            Err(err) => {
                // Help and usage errors print themselves.
                let _ = err.print();
                Ok(())
            }
        };
        if let Err(err) = result {
            emit_error(&command, &err, ctx.output.json)?;
        }
        ctx.refresh_achievements(now);

        if ctx.session.is_dirty() {
            writer.save(ctx.session.projects().to_vec());
            ctx.session.mark_clean();
        }
        prompt(interactive)?;
    }

    writer.flush().await;
    let stats = writer.shutdown().await;
    info!(writes = stats.writes, failures = stats.failures, "shell closed");
    Ok(())
}

fn step(ctx: &mut Context, undo: bool) -> Result<()> {
    let (command, entry) = if undo {
        ("undo", ctx.session.undo())
    } else {
        ("redo", ctx.session.redo())
    };

    let human = match &entry {
        Some(entry) => HumanOutput::new(format!(
            "{}: {}",
            if undo { "Undid" } else { "Redid" },
            entry.description
        )),
        None => HumanOutput::new(if undo { "Nothing to undo" } else { "Nothing to redo" }),
    };
    let output = StepOutput {
        entry,
        can_undo: ctx.session.can_undo(),
        can_redo: ctx.session.can_redo(),
    };
    emit_success(ctx.output, command, &output, Some(&human))
}

fn show_history(ctx: &Context) -> Result<()> {
    let entries = ctx.session.history();
    let cursor = ctx.session.cursor();

    let mut human = HumanOutput::new("History");
    human.push_summary("entries", entries.len().to_string());
    for (index, entry) in entries.iter().enumerate() {
        let marker = if Some(index) == cursor { ">" } else { " " };
        let applied = cursor.is_some_and(|c| index <= c);
        human.push_detail(format!(
            "{marker} {} [{}] {}{}",
            index,
            entry.timestamp.format("%H:%M:%S"),
            entry.description,
            if applied { "" } else { " (undone)" }
        ));
    }
    emit_success(
        ctx.output,
        "history",
        &HistoryOutput { cursor, entries },
        Some(&human),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_whitespace_and_respect_quotes() {
        let words = split_words(r#"task add "Write the brief" -p 'Acme Corp'"#).unwrap();
        assert_eq!(words, vec!["task", "add", "Write the brief", "-p", "Acme Corp"]);
        assert_eq!(split_words(r#"note add x "say \"hi\"""#).unwrap()[3], r#"say "hi""#);
        assert!(split_words("   ").unwrap().is_empty());
        assert!(split_words("task add \"open").is_err());
    }

    #[test]
    fn shell_lines_parse_history_commands() {
        let parsed = ShellLine::try_parse_from(["undo"]).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Undo));
        let parsed = ShellLine::try_parse_from(["exit"]).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Quit));
        let parsed = ShellLine::try_parse_from(["task", "done", "17"]).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Core(CoreCommand::Task(_))));
    }
}
