use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::process::{CommandSpec, default_working_dir, deserialize_arguments, run_logged};
use crate::domain::TreadleError;
use crate::ports::ProcessLogSink;
use crate::typed::{Handler, Invocation, Task};

/// Payload of a training run: `<interpreter> <script> <config> [args...]`.
///
/// Every field is optional in stored payloads; missing ones take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingTask {
    pub python_interpreter: String,
    pub training_script: String,
    pub config_file: String,
    #[serde(deserialize_with = "deserialize_arguments")]
    pub optional_arguments: Vec<String>,
    pub working_dir: Option<String>,
}

impl Default for TrainingTask {
    fn default() -> Self {
        Self {
            python_interpreter: "python".to_string(),
            training_script: "train.py".to_string(),
            config_file: "default_config.py".to_string(),
            optional_arguments: Vec::new(),
            working_dir: None,
        }
    }
}

impl Task for TrainingTask {
    const TYPE: &'static str = "mmrotate_training";
}

impl TrainingTask {
    pub fn new(
        python_interpreter: impl Into<String>,
        training_script: impl Into<String>,
        config_file: impl Into<String>,
    ) -> Self {
        Self {
            python_interpreter: python_interpreter.into(),
            training_script: training_script.into(),
            config_file: config_file.into(),
            ..Self::default()
        }
    }

    pub fn with_arguments(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.optional_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> CommandSpec {
        let mut args = vec![self.training_script.clone(), self.config_file.clone()];
        args.extend(self.optional_arguments.iter().cloned());
        CommandSpec {
            program: self.python_interpreter.clone(),
            args,
            working_dir: self
                .working_dir
                .as_deref()
                .map(Into::into)
                .unwrap_or_else(|| default_working_dir(&self.training_script)),
            config_file: self.config_file.clone(),
        }
    }
}

pub struct TrainingHandler {
    log: Arc<dyn ProcessLogSink>,
}

impl TrainingHandler {
    pub fn new(log: Arc<dyn ProcessLogSink>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Handler<TrainingTask> for TrainingHandler {
    async fn execute(
        &self,
        task: TrainingTask,
        invocation: &Invocation,
    ) -> Result<(), TreadleError> {
        run_logged(self.log.clone(), TrainingTask::TYPE, &task.command(), invocation).await
    }
}
