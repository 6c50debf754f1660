//! Error types for zen
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown project or task, bad config)
//! - 4: Operation failed (storage unavailable, IO, serialization)
//!
//! The core (store, history, undo) never produces these: a missing target
//! there is an absent result. Errors only come from storage and the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the zen CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for zen operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(u64),

    #[error("Task {task} not found in project {project}")]
    TaskNotFound { project: u64, task: u64 },

    #[error("Task not found: {0}")]
    UnknownTask(u64),

    #[error("Focus session not found: {0}")]
    SessionNotFound(u64),

    // Operation failures (exit code 4)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Data directory could not be resolved")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::ProjectNotFound(_)
            | Error::TaskNotFound { .. }
            | Error::UnknownTask(_)
            | Error::SessionNotFound(_) => exit_codes::USER_ERROR,

            Error::StorageUnavailable(_)
            | Error::NoDataDir
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the error carries ids.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::ProjectNotFound(id) => Some(serde_json::json!({ "project_id": id })),
            Error::TaskNotFound { project, task } => Some(serde_json::json!({
                "project_id": project,
                "task_id": task,
            })),
            Error::UnknownTask(id) => Some(serde_json::json!({ "task_id": id })),
            Error::SessionNotFound(id) => Some(serde_json::json!({ "session_id": id })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for zen operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_are_user_errors() {
        assert_eq!(Error::ProjectNotFound(1).exit_code(), exit_codes::USER_ERROR);
        assert_eq!(
            Error::TaskNotFound { project: 1, task: 2 }.exit_code(),
            exit_codes::USER_ERROR
        );
    }

    #[test]
    fn storage_errors_are_operation_failures() {
        let err = Error::StorageUnavailable("primary and secondary failed".to_string());
        assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
        let io = Error::from(std::io::Error::other("disk"));
        assert_eq!(io.exit_code(), exit_codes::OPERATION_FAILED);
    }

    #[test]
    fn task_not_found_details_carry_ids() {
        let details = Error::TaskNotFound { project: 7, task: 9 }.details().unwrap();
        assert_eq!(details["project_id"], 7);
        assert_eq!(details["task_id"], 9);
    }
}
