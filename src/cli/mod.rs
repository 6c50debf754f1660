//! Command-line interface for zen
//!
//! The clap tree lives here; each command group is implemented in its own
//! submodule. One-shot commands load the data directory, run, and save
//! once. `zen shell` keeps a session open and saves through the debounced
//! writer.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Effort, NoteKind, Priority};
use crate::output::OutputOptions;
use crate::session::Session;
use crate::storage::{self, Storage, DATA_DIR_ENV};

mod export;
mod focus;
mod note;
mod project;
mod shell;
mod stats;
mod task;

/// zen - a personal task manager
///
/// Clients and their tasks, undo history, streaks, levels, achievements
/// and focus tracking.
#[derive(Parser, Debug)]
#[command(name = "zen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform local data directory)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Core(CoreCommand),

    /// Interactive session with undo/redo
    Shell,
}

/// Commands available both one-shot and inside `zen shell`.
#[derive(Subcommand, Debug)]
pub enum CoreCommand {
    /// Client (project) management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Client notes and account notes
    #[command(subcommand)]
    Note(NoteCommands),

    /// Focus sessions
    #[command(subcommand)]
    Focus(FocusCommands),

    /// Completion counts, streaks and focus time
    Stats,

    /// Achievement progress and unlocks
    Achievements,

    /// Points and level
    Level,

    /// Productivity health score and recommendations
    Health,

    /// Remaining-work estimates
    Predict {
        /// Limit to one client
        project: Option<String>,
    },

    /// This week against last week
    Review,

    /// Per-day completions, points and focus time
    Daily {
        /// Number of days ending today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Write a dated JSON backup of every client and task
    Export {
        /// Output file or directory (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Add a client
    Add {
        name: String,
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Remove a client and all of its tasks
    Rm { project: String },

    /// List clients
    List,

    /// Show a client with its progress and burndown
    Show { project: String },

    /// Change a client's priority
    Priority { project: String, priority: Priority },

    /// Rename a client
    Rename { project: String, name: String },

    /// Set the target completion date (YYYY-MM-DD, or "none")
    Target { project: String, date: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to one or more clients
    Add {
        title: String,

        /// Client id or name (repeatable)
        #[arg(short, long = "project", required_unless_present = "all")]
        projects: Vec<String>,

        /// Add to every client
        #[arg(long, conflicts_with = "projects")]
        all: bool,

        #[arg(long, default_value = "normal")]
        priority: Priority,

        #[arg(long, default_value = "medium")]
        effort: Effort,
    },

    /// Delete a task
    Rm { task: u64 },

    /// Toggle a task between done and open
    Done { task: u64 },

    /// Edit a task
    Edit {
        task: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        effort: Option<Effort>,
        /// Due date (YYYY-MM-DD, or "none")
        #[arg(long)]
        due: Option<String>,
    },

    /// Move a task to the position of another task in the same client
    Move {
        task: u64,
        #[arg(long)]
        to: u64,
    },

    /// Comment on a task
    Comment { task: u64, text: String },

    /// List tasks
    List {
        /// Client id or name
        #[arg(short, long)]
        project: Option<String>,

        /// Only open tasks
        #[arg(long, conflicts_with = "done")]
        open: bool,

        /// Only completed tasks
        #[arg(long)]
        done: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// Add a note to a client
    Add {
        project: String,
        content: String,
        /// Account note instead of general note
        #[arg(long)]
        account: bool,
    },

    /// Replace a note's text
    Edit {
        project: String,
        note: u64,
        content: String,
        #[arg(long)]
        account: bool,
    },

    /// Delete a note
    Rm {
        project: String,
        note: u64,
        #[arg(long)]
        account: bool,
    },

    /// List a client's notes
    List {
        project: String,
        #[arg(long)]
        account: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FocusCommands {
    /// Start a focus session
    Start {
        project: String,
        #[arg(long)]
        task: Option<u64>,
    },

    /// End a focus session (the running one by default)
    End {
        #[arg(long)]
        id: Option<u64>,
        /// Mark the session as completed
        #[arg(long)]
        completed: bool,
    },

    /// List focus sessions, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Suggest the best task to focus on next
    Next,
}

/// Loaded data directory plus the session built from it.
pub struct Context {
    pub storage: Storage,
    pub config: Config,
    pub session: Session,
    pub output: OutputOptions,
}

impl Context {
    pub fn open(data_dir: Option<PathBuf>, output: OutputOptions) -> Result<Self> {
        let data_dir = storage::resolve_data_dir(data_dir)?;
        std::fs::create_dir_all(&data_dir)?;
        let config = Config::load_from_dir(&data_dir);
        let storage = Storage::new(&data_dir, config.storage.clone());

        let report = storage.gateway().load(Utc::now());
        let session = Session::new(
            report.projects,
            storage.load_sessions(),
            storage.load_ledger(),
            config.history.max_entries,
        );
        Ok(Self {
            storage,
            config,
            session,
            output,
        })
    }

    /// Save the store synchronously when it changed. Failures are logged;
    /// the in-memory state stays authoritative.
    pub fn save_now(&mut self) {
        if !self.session.is_dirty() {
            return;
        }
        match self.storage.gateway().save(self.session.projects()) {
            Ok(_) => self.session.mark_clean(),
            Err(err) => {
                error!(error = %err, "failed to save store");
                if !self.output.quiet && !self.output.json {
                    eprintln!("warning: changes were not saved: {err}");
                }
            }
        }
    }

    pub fn save_sessions(&self) {
        if let Err(err) = self.storage.save_sessions(self.session.sessions()) {
            error!(error = %err, "failed to save focus sessions");
        }
    }

    /// Record achievements reached by the last command and announce them.
    pub fn refresh_achievements(&mut self, now: DateTime<Utc>) {
        let fresh = self.session.refresh_achievements(now);
        if fresh.is_empty() {
            return;
        }
        if let Err(err) = self.storage.save_ledger(self.session.ledger()) {
            error!(error = %err, "failed to save achievements");
        }
        if !self.output.quiet && !self.output.json {
            for achievement in fresh {
                eprintln!("Achievement unlocked: {} - {}", achievement.name, achievement.description);
            }
        }
    }
}

/// Run one command against an open context.
pub fn execute(ctx: &mut Context, command: CoreCommand, now: DateTime<Utc>) -> Result<()> {
    match command {
        CoreCommand::Project(cmd) => project::run(ctx, cmd, now),
        CoreCommand::Task(cmd) => task::run(ctx, cmd, now),
        CoreCommand::Note(cmd) => note::run(ctx, cmd, now),
        CoreCommand::Focus(cmd) => focus::run(ctx, cmd, now),
        CoreCommand::Stats => stats::run_stats(ctx, now),
        CoreCommand::Achievements => stats::run_achievements(ctx, now),
        CoreCommand::Level => stats::run_level(ctx, now),
        CoreCommand::Health => stats::run_health(ctx, now),
        CoreCommand::Predict { project } => stats::run_predict(ctx, project.as_deref(), now),
        CoreCommand::Review => stats::run_review(ctx, now),
        CoreCommand::Daily { days } => stats::run_daily(ctx, days, now),
        CoreCommand::Export { out } => export::run(ctx, out, now),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let ctx = Context::open(self.data_dir, output)?;
        match self.command {
            Commands::Shell => shell::run(ctx),
            Commands::Core(command) => {
                let mut ctx = ctx;
                let now = Utc::now();
                let result = execute(&mut ctx, command, now);
                ctx.refresh_achievements(now);
                ctx.save_now();
                result
            }
        }
    }
}

/// Resolve a client by numeric id or by case-insensitive name.
pub(crate) fn resolve_project(session: &Session, reference: &str) -> Result<u64> {
    let reference = reference.trim();
    if let Ok(id) = reference.parse::<u64>() {
        if session.store().project(id).is_some() {
            return Ok(id);
        }
    }
    let mut matches = session
        .projects()
        .iter()
        .filter(|project| project.name.eq_ignore_ascii_case(reference));
    match (matches.next(), matches.next()) {
        (Some(project), None) => Ok(project.id),
        (Some(_), Some(_)) => Err(Error::InvalidArgument(format!(
            "more than one client is named '{reference}'; use its id"
        ))),
        (None, _) => match reference.parse::<u64>() {
            Ok(id) => Err(Error::ProjectNotFound(id)),
            Err(_) => Err(Error::InvalidArgument(format!("no client named '{reference}'"))),
        },
    }
}

/// Find the client holding a task id.
pub(crate) fn locate_task(session: &Session, task_id: u64) -> Result<u64> {
    session
        .store()
        .tasks()
        .find(|(_, task)| task.id == task_id)
        .map(|(project, _)| project.id)
        .ok_or(Error::UnknownTask(task_id))
}

/// Parse `YYYY-MM-DD` (end of that day, UTC) or an RFC 3339 timestamp.
/// "none" means no date.
pub(crate) fn parse_date(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let end = date
            .and_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid date '{raw}'")))?;
        return Ok(Some(end.and_utc()));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| Error::InvalidArgument(format!("invalid date '{raw}' (expected YYYY-MM-DD)")))
}

pub(crate) fn note_kind(account: bool) -> NoteKind {
    if account {
        NoteKind::Account
    } else {
        NoteKind::Note
    }
}

pub(crate) fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::AchievementLedger;
    use chrono::TimeZone;

    fn session() -> Session {
        let mut session = Session::new(Vec::new(), Vec::new(), AchievementLedger::default(), 50);
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        session.add_client("Acme", Priority::High, now).unwrap();
        session.add_client("acme", Priority::Low, now).unwrap();
        session.add_client("Globex", Priority::Low, now).unwrap();
        session
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["zen", "task", "add", "Write", "-p", "Acme", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Core(CoreCommand::Task(TaskCommands::Add { projects, priority, .. })) => {
                assert_eq!(projects, vec!["Acme".to_string()]);
                assert_eq!(priority, Priority::Normal);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn task_add_requires_a_target() {
        assert!(Cli::try_parse_from(["zen", "task", "add", "Write"]).is_err());
        assert!(Cli::try_parse_from(["zen", "task", "add", "Write", "--all"]).is_ok());
    }

    #[test]
    fn projects_resolve_by_id_or_unique_name() {
        let session = session();
        let globex = session.projects()[2].id;
        assert_eq!(resolve_project(&session, "globex").unwrap(), globex);
        assert_eq!(resolve_project(&session, &globex.to_string()).unwrap(), globex);
        assert!(matches!(
            resolve_project(&session, "ACME"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(resolve_project(&session, "77"), Err(Error::ProjectNotFound(77))));
    }

    #[test]
    fn dates_parse_to_end_of_day() {
        let due = parse_date("2024-03-09").unwrap().unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap() + chrono::Duration::milliseconds(999));
        assert_eq!(parse_date("none").unwrap(), None);
        assert!(parse_date("next tuesday").is_err());
    }
}
