//! Built-in handlers.
//!
//! - `print`: reports a message
//! - `mmrotate_training` / `mmrotate_testing`: run an external training or
//!   evaluation command, output captured in a per-execution log file

pub mod evaluation;
pub mod print;
pub mod process;
pub mod training;

use std::fmt;
use std::sync::Arc;

pub use self::evaluation::{EvaluationHandler, EvaluationTask};
pub use self::print::{PrintHandler, PrintTask};
pub use self::process::{CommandSpec, default_working_dir, run_logged};
pub use self::training::{TrainingHandler, TrainingTask};

use crate::ports::ProcessLogSink;
use crate::typed::{HandlerRegistry, RegistryError, Task};

/// The closed set of built-in handler variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Print,
    Training,
    Evaluation,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 3] = [
        HandlerKind::Print,
        HandlerKind::Training,
        HandlerKind::Evaluation,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            HandlerKind::Print => PrintTask::TYPE,
            HandlerKind::Training => TrainingTask::TYPE,
            HandlerKind::Evaluation => EvaluationTask::TYPE,
        }
    }

    /// Add this variant's handler to `registry`.
    pub fn register(
        self,
        registry: &mut HandlerRegistry,
        log: Arc<dyn ProcessLogSink>,
    ) -> Result<(), RegistryError> {
        match self {
            HandlerKind::Print => registry.register::<PrintTask, _>(PrintHandler),
            HandlerKind::Training => {
                registry.register::<TrainingTask, _>(TrainingHandler::new(log))
            }
            HandlerKind::Evaluation => {
                registry.register::<EvaluationTask, _>(EvaluationHandler::new(log))
            }
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
