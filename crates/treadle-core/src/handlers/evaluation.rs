use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::process::{CommandSpec, default_working_dir, deserialize_arguments, run_logged};
use crate::domain::TreadleError;
use crate::ports::ProcessLogSink;
use crate::typed::{Handler, Invocation, Task};

/// Payload of an evaluation run:
/// `<interpreter> <script> <config> <checkpoint> [args...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationTask {
    pub python_interpreter: String,
    pub testing_script: String,
    pub config_file: String,
    pub checkpoint_file: String,
    #[serde(deserialize_with = "deserialize_arguments")]
    pub optional_arguments: Vec<String>,
    pub working_dir: Option<String>,
}

impl Default for EvaluationTask {
    fn default() -> Self {
        Self {
            python_interpreter: "python".to_string(),
            testing_script: "test.py".to_string(),
            config_file: "default_config.py".to_string(),
            checkpoint_file: "latest.pth".to_string(),
            optional_arguments: Vec::new(),
            working_dir: None,
        }
    }
}

impl Task for EvaluationTask {
    const TYPE: &'static str = "mmrotate_testing";
}

impl EvaluationTask {
    pub fn new(
        python_interpreter: impl Into<String>,
        testing_script: impl Into<String>,
        config_file: impl Into<String>,
        checkpoint_file: impl Into<String>,
    ) -> Self {
        Self {
            python_interpreter: python_interpreter.into(),
            testing_script: testing_script.into(),
            config_file: config_file.into(),
            checkpoint_file: checkpoint_file.into(),
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
        let mut args = vec![
            self.testing_script.clone(),
            self.config_file.clone(),
            self.checkpoint_file.clone(),
        ];
        args.extend(self.optional_arguments.iter().cloned());
        CommandSpec {
            program: self.python_interpreter.clone(),
            args,
            working_dir: self
                .working_dir
                .as_deref()
                .map(Into::into)
                .unwrap_or_else(|| default_working_dir(&self.testing_script)),
            config_file: self.config_file.clone(),
        }
    }
}

pub struct EvaluationHandler {
    log: Arc<dyn ProcessLogSink>,
}

impl EvaluationHandler {
    pub fn new(log: Arc<dyn ProcessLogSink>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Handler<EvaluationTask> for EvaluationHandler {
    async fn execute(
        &self,
        task: EvaluationTask,
        invocation: &Invocation,
    ) -> Result<(), TreadleError> {
        run_logged(self.log.clone(), EvaluationTask::TYPE, &task.command(), invocation).await
    }
}
