//! FeasibilityProbe - a bounded trial run of one task.
//!
//! The task is marked Testing, its handler runs on a detached tokio task, and
//! the caller waits at most `bound`. The three-way `BoundedOutcome` is turned
//! into a verdict by a `FeasibilityPolicy`; the default counts "still running
//! at the deadline" as feasible.
//!
//! Work abandoned at the deadline is not cancelled. A spawned child process
//! keeps running and keeps writing to its log file.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    BoundedOutcome, FeasibilityPolicy, TaskId, TaskStatus, TreadleError, timed_out_is_feasible,
};
use crate::ports::TaskStore;
use crate::typed::{HandlerRegistry, Invocation};

/// Drive `work` on its own tokio task and wait at most `bound` for it.
///
/// A `ProcessTimeout` raised by the work itself is also `TimedOut`. At the
/// deadline the task is detached, not aborted.
pub async fn run_bounded<F>(work: F, bound: Duration) -> Result<BoundedOutcome, TreadleError>
where
    F: Future<Output = Result<(), TreadleError>> + Send + 'static,
{
    if bound.is_zero() {
        return Err(TreadleError::Config("probe bound must be positive".to_string()));
    }

    let handle = tokio::spawn(work);
    let outcome = match tokio::time::timeout(bound, handle).await {
        Err(_) => BoundedOutcome::TimedOut,
        Ok(Ok(Ok(()))) => BoundedOutcome::Completed,
        Ok(Ok(Err(err))) if err.is_timeout() => BoundedOutcome::TimedOut,
        Ok(Ok(Err(err))) => BoundedOutcome::Failed(err.to_string()),
        Ok(Err(join)) => BoundedOutcome::Failed(format!("handler panicked: {join}")),
    };
    Ok(outcome)
}

pub struct FeasibilityProbe {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
    policy: FeasibilityPolicy,
}

impl FeasibilityProbe {
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            store,
            registry,
            policy: timed_out_is_feasible,
        }
    }

    /// Replace the outcome → verdict mapping.
    pub fn with_policy(mut self, policy: FeasibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Trial-run task `id` for at most `bound`, store the verdict, return it.
    ///
    /// Store errors (including `TaskNotFound` and a task that is not Pending)
    /// are returned; handler errors only shape the verdict.
    pub async fn run(&self, id: TaskId, bound: Duration) -> Result<bool, TreadleError> {
        if bound.is_zero() {
            return Err(TreadleError::Config("probe bound must be positive".to_string()));
        }

        let task = self.store.get_task(id).await?;
        self.store.update_status(id, TaskStatus::Testing).await?;
        tracing::info!(
            task_id = %id,
            task_type = %task.task_type,
            bound_secs = bound.as_secs_f64(),
            "probing task"
        );

        let outcome = match self.registry.resolve(task.task_type.as_str()) {
            Ok(handler) => {
                let invocation = Invocation::new(task.value).with_timeout(bound);
                run_bounded(async move { handler.execute_dyn(invocation).await }, bound).await?
            }
            Err(err) => BoundedOutcome::Failed(err.to_string()),
        };

        let feasible = (self.policy)(&outcome);
        let status = if feasible {
            TaskStatus::TestSuccess
        } else {
            TaskStatus::TestFailed
        };
        self.store.update_status(id, status).await?;

        match &outcome {
            BoundedOutcome::Failed(reason) => {
                tracing::warn!(task_id = %id, %status, reason = %reason, "probe run failed");
            }
            BoundedOutcome::TimedOut => {
                tracing::info!(task_id = %id, %status, "probe deadline reached; work left running");
            }
            BoundedOutcome::Completed => {
                tracing::info!(task_id = %id, %status, "probe run completed");
            }
        }
        Ok(feasible)
    }
}
