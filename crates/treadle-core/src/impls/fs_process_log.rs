use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;

use crate::domain::TreadleError;
use crate::ports::{Clock, ProcessLog, ProcessLogSink, SystemClock};

/// Writes process logs under `<root>/handler_log/<task_type>/`.
///
/// File names are `<YYYYMMDDHHMMSS>_<config stem>.log` in local time; two runs
/// of the same config within one second share (and append to) one file.
pub struct FsProcessLog {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsProcessLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// Where the next log for this task type and config would go.
    pub fn log_path(&self, task_type: &str, config_file: &str) -> PathBuf {
        let stamp = self
            .clock
            .now()
            .with_timezone(&Local)
            .format("%Y%m%d%H%M%S");
        let path = self
            .root
            .join("handler_log")
            .join(task_type)
            .join(format!("{stamp}_{}.log", file_stem(config_file)));
        std::path::absolute(&path).unwrap_or(path)
    }
}

impl ProcessLogSink for FsProcessLog {
    fn open(&self, task_type: &str, config_file: &str) -> Result<ProcessLog, TreadleError> {
        let path = self.log_path(task_type, config_file);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| TreadleError::LogArtifact {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TreadleError::LogArtifact {
                path: path.clone(),
                source,
            })?;
        Ok(ProcessLog::new(path, file))
    }
}

/// Base name without extension; `"default_config"` for `"cfgs/default_config.py"`.
pub fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
