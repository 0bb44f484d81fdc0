use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TreadleError;
use crate::typed::{Handler, Invocation, Task};

const NO_MESSAGE: &str = "[No message provided]";

/// Diagnostic payload: a message to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintTask {
    #[serde(default = "no_message")]
    pub message: String,
}

fn no_message() -> String {
    NO_MESSAGE.to_string()
}

impl PrintTask {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Task for PrintTask {
    const TYPE: &'static str = "print";
}

/// Reports the message and succeeds. Spawns nothing, writes no process log.
pub struct PrintHandler;

#[async_trait]
impl Handler<PrintTask> for PrintHandler {
    async fn execute(&self, task: PrintTask, _invocation: &Invocation) -> Result<(), TreadleError> {
        tracing::info!(
            target: "treadle::print",
            message = %task.message,
            "[PrintHandler] {}",
            task.message
        );
        Ok(())
    }
}
