//! AppBuilder - wiring of store and handlers.
//!
//! Registration happens here and only here. `build()` freezes the registry
//! behind an `Arc` and fails fast when an expected task type is missing.

use std::sync::Arc;

use super::probe::FeasibilityProbe;
use super::scheduler::{Scheduler, SchedulerConfig};
use crate::domain::{StatusCounts, TreadleError};
use crate::handlers::HandlerKind;
use crate::ports::{ProcessLogSink, TaskStore};
use crate::typed::{Handler, HandlerRegistry, RegistryError, Task};

/// # Example
/// ```ignore
/// let app = AppBuilder::new(store)
///     .with_builtin_handlers(log)?
///     .expect_tasks(&["print", "mmrotate_training"])
///     .build()?;
/// let report = app.scheduler(config.scheduler_config())?.run().await?;
/// ```
pub struct AppBuilder {
    store: Arc<dyn TaskStore>,
    registry: HandlerRegistry,
    expected_tasks: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),
}

impl AppBuilder {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            registry: HandlerRegistry::new(),
            expected_tasks: None,
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Register every `HandlerKind`, process handlers writing through `log`.
    pub fn with_builtin_handlers(
        mut self,
        log: Arc<dyn ProcessLogSink>,
    ) -> Result<Self, RegistryError> {
        for kind in HandlerKind::ALL {
            kind.register(&mut self.registry, log.clone())?;
        }
        Ok(self)
    }

    /// Task types `build()` must find registered.
    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered_types = self.registry.registered_types();
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|x| !registered_types.contains(x))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }
        Ok(App {
            store: self.store,
            registry: Arc::new(self.registry),
        })
    }
}

/// A store plus the frozen registry. Cheap to hand out scheduler and probe
/// instances from.
pub struct App {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
}

impl App {
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> Result<Scheduler, TreadleError> {
        Scheduler::new(self.store.clone(), self.registry.clone(), config)
    }

    pub fn probe(&self) -> FeasibilityProbe {
        FeasibilityProbe::new(self.store.clone(), self.registry.clone())
    }

    pub async fn status(&self) -> Result<StatusCounts, TreadleError> {
        self.store.counts_by_status().await
    }
}
