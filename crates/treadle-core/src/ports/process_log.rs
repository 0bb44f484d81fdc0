//! ProcessLogSink port - where a spawned command's output goes.
//!
//! Each execution gets one append-mode UTF-8 file. The header block is written
//! and flushed before the child starts; the child then inherits the same file
//! for both stdout and stderr.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;

use crate::domain::TreadleError;

pub const SEPARATOR_WIDTH: usize = 50;

pub trait ProcessLogSink: Send + Sync {
    /// Open the log for one execution of `task_type` driven by `config_file`.
    fn open(&self, task_type: &str, config_file: &str) -> Result<ProcessLog, TreadleError>;
}

/// An open per-execution log file.
#[derive(Debug)]
pub struct ProcessLog {
    path: PathBuf,
    file: File,
}

impl ProcessLog {
    pub fn new(path: PathBuf, file: File) -> Self {
        Self { path, file }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the header block:
    ///
    /// ```text
    /// ==================================================
    /// config:
    /// <payload, 4-space indented>
    /// command:
    /// <argv joined by spaces>
    /// ==================================================
    /// ```
    pub fn write_header(
        &mut self,
        payload: &serde_json::Value,
        argv: &[String],
    ) -> Result<(), TreadleError> {
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let block = format!(
            "{separator}\nconfig:\n{}\ncommand:\n{}\n{separator}\n\n",
            pretty_payload(payload)?,
            argv.join(" "),
        );
        let written = self.file.write_all(block.as_bytes());
        written
            .and_then(|()| self.file.flush())
            .map_err(|source| TreadleError::LogArtifact {
                path: self.path.clone(),
                source,
            })
    }

    /// Handles for the child's stdout and stderr, both pointing at this file.
    pub fn stdio(&self) -> Result<(Stdio, Stdio), TreadleError> {
        let out = self.file.try_clone().map_err(|source| self.io_error(source))?;
        let err = self.file.try_clone().map_err(|source| self.io_error(source))?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }

    fn io_error(&self, source: std::io::Error) -> TreadleError {
        TreadleError::LogArtifact {
            path: self.path.clone(),
            source,
        }
    }
}

fn pretty_payload(payload: &serde_json::Value) -> Result<String, TreadleError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    payload
        .serialize(&mut ser)
        .map_err(|e| TreadleError::InvalidPayload(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TreadleError::InvalidPayload(e.to_string()))
}
