//! Scheduler - the polling dispatch loop.
//!
//! # Flow
//! 1. `TaskStore::fetch_pending()`
//! 2. empty batch: bump the consecutive-empty counter, stop at the maximum,
//!    otherwise sleep `poll_interval`
//! 3. non-empty batch: reset the counter, then per task in fetch order
//!    mark Running → resolve → execute → Done / Failed
//!
//! Tasks run strictly one after another. A handler error or panic fails only
//! its task; a failed fetch or status write ends the loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::domain::{TaskRecord, TaskStatus, TreadleError};
use crate::ports::TaskStore;
use crate::typed::{HandlerRegistry, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Sleep between two empty fetches.
    pub poll_interval: Duration,

    /// Stop after this many consecutive empty fetches. Must be at least 1.
    pub max_empty_polls: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_empty_polls: 5,
        }
    }
}

/// What one `run` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub polls: u64,
    pub empty_polls: u64,
    pub dispatched: u64,
    pub done: u64,
    pub failed: u64,
    /// Fetched tasks that another caller moved out of Pending first.
    pub skipped: u64,
}

pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<HandlerRegistry>,
        config: SchedulerConfig,
    ) -> Result<Self, TreadleError> {
        if config.max_empty_polls == 0 {
            return Err(TreadleError::Config(
                "max_empty_polls must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            registry,
            config,
        })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Run until the empty-poll limit is reached.
    pub async fn run(&self) -> Result<SchedulerReport, TreadleError> {
        let (_never, shutdown) = watch::channel(false);
        self.run_until(shutdown).await
    }

    /// Like `run`, but also stops once `shutdown` reads `true`.
    ///
    /// Shutdown is checked before each fetch, between tasks, and during the
    /// inter-poll sleep. A running handler is always awaited to the end.
    pub async fn run_until(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SchedulerReport, TreadleError> {
        let mut report = SchedulerReport::default();
        let mut empty_fetches: u32 = 0;

        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            max_empty_polls = self.config.max_empty_polls,
            handlers = ?self.registry.registered_types(),
            "scheduler started"
        );

        'poll: loop {
            if *shutdown.borrow() {
                tracing::info!("shutdown requested; scheduler stopping");
                break;
            }

            let tasks = self.store.fetch_pending().await?;
            report.polls += 1;

            if tasks.is_empty() {
                report.empty_polls += 1;
                empty_fetches += 1;
                if empty_fetches >= self.config.max_empty_polls {
                    tracing::info!(empty_fetches, "no pending tasks; scheduler stopping");
                    break;
                }
                tracing::debug!(empty_fetches, "no pending tasks");
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    // a dropped sender disables this branch
                    Ok(()) = shutdown.changed() => {}
                }
                continue;
            }

            empty_fetches = 0;
            for task in tasks {
                if *shutdown.borrow() {
                    tracing::info!("shutdown requested; leaving the rest of the batch pending");
                    break 'poll;
                }
                self.dispatch(task, &mut report).await?;
            }
        }

        tracing::info!(report = ?report, "scheduler finished");
        Ok(report)
    }

    async fn dispatch(
        &self,
        task: TaskRecord,
        report: &mut SchedulerReport,
    ) -> Result<(), TreadleError> {
        let id = task.id;
        match self.store.update_status(id, TaskStatus::Running).await {
            Ok(()) => {}
            Err(err @ (TreadleError::InvalidTransition { .. } | TreadleError::TaskNotFound(_))) => {
                tracing::warn!(task_id = %id, error = %err, "task no longer pending; skipped");
                report.skipped += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        }
        report.dispatched += 1;
        tracing::info!(task_id = %id, task_type = %task.task_type, "running task");

        let result = match self.registry.resolve(task.task_type.as_str()) {
            Ok(handler) => {
                let invocation = Invocation::new(task.value);
                // a panicking handler surfaces as a JoinError instead of unwinding the loop
                tokio::spawn(async move { handler.execute_dyn(invocation).await })
                    .await
                    .unwrap_or_else(|join| Err(TreadleError::HandlerAborted(join.to_string())))
            }
            Err(err) => Err(err),
        };

        // handler errors, store-flavoured ones included, only fail this task;
        // the loop stops when recording the outcome fails
        let status = match result {
            Ok(()) => TaskStatus::Done,
            Err(err) => {
                tracing::warn!(task_id = %id, error = %err, "task failed");
                TaskStatus::Failed
            }
        };
        self.store.update_status(id, status).await?;
        match status {
            TaskStatus::Done => {
                report.done += 1;
                tracing::info!(task_id = %id, %status, "task finished");
            }
            _ => report.failed += 1,
        }
        Ok(())
    }
}
