//! Configuration for the store, the process logs, and the scheduler loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::SchedulerConfig;
use crate::domain::TreadleError;

/// Top-level configuration. Every field may be omitted from the TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreadleConfig {
    /// SQLite file holding the task table.
    pub store_path: PathBuf,
    /// Root for `handler_log/` and the service log.
    pub log_root: PathBuf,
    /// Seconds to sleep after an empty fetch.
    pub fetch_interval_secs: u64,
    /// Consecutive empty fetches before the scheduler stops.
    pub max_empty_fetches: u32,
}

impl Default for TreadleConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/task.sqlite"),
            log_root: PathBuf::from("logs"),
            fetch_interval_secs: 5,
            max_empty_fetches: 5,
        }
    }
}

impl TreadleConfig {
    /// Load from a TOML file; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// `Config` if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, TreadleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TreadleError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, TreadleError> {
        let config: Self =
            toml::from_str(content).map_err(|e| TreadleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TreadleError> {
        if self.max_empty_fetches == 0 {
            return Err(TreadleError::Config(
                "max_empty_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.fetch_interval_secs),
            max_empty_polls: self.max_empty_fetches,
        }
    }
}
