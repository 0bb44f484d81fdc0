//! Errors - the crate-wide error taxonomy.

use std::path::PathBuf;
use std::time::Duration;

use super::{TaskId, TaskStatus};

#[derive(Debug, thiserror::Error)]
pub enum TreadleError {
    #[error("unknown handler type '{0}'")]
    UnknownHandlerType(String),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("process exited with {}", describe_exit(.exit_code))]
    ProcessExecutionFailure { exit_code: Option<i32> },

    #[error("process still running after {}s", .after.as_secs_f64())]
    ProcessTimeout { after: Duration },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot prepare process log {path}: {source}")]
    LogArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("handler aborted: {0}")]
    HandlerAborted(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("store i/o: {0}")]
    StoreIo(String),

    #[error("configuration: {0}")]
    Config(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl TreadleError {
    /// Did the handler outlive its timeout?
    pub fn is_timeout(&self) -> bool {
        matches!(self, TreadleError::ProcessTimeout { .. })
    }
}

impl From<rusqlite::Error> for TreadleError {
    fn from(err: rusqlite::Error) -> Self {
        TreadleError::StoreIo(err.to_string())
    }
}
