//! TaskStore port - the durable task table.
//!
//! The store is the only shared mutable resource. The scheduler and a probe
//! may use one store concurrently, so implementations serialize writes and
//! never expose a half-applied update.

use async_trait::async_trait;

use crate::domain::{StatusCounts, TaskId, TaskRecord, TaskStatus, TaskType, TreadleError};

/// Source of truth for task rows.
///
/// # Contract
/// - `add_task` inserts a `Pending` row and returns the assigned id. The payload
///   is not inspected.
/// - `fetch_pending` returns every `Pending` row, oldest `create_time` first
///   (ties broken by id). An empty list is not an error.
/// - `update_status` is a compare-and-set along the state machine: the row must
///   currently be in one of `status.predecessors()`, otherwise
///   `InvalidTransition`. Missing rows yield `TaskNotFound`.
/// - Every write is committed before the call returns.
/// - Rows are never deleted.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn add_task(
        &self,
        task_type: TaskType,
        value: serde_json::Value,
    ) -> Result<TaskId, TreadleError>;

    async fn fetch_pending(&self) -> Result<Vec<TaskRecord>, TreadleError>;

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), TreadleError>;

    async fn get_task(&self, id: TaskId) -> Result<TaskRecord, TreadleError>;

    /// All rows in id order, optionally restricted to one status.
    async fn list_tasks(&self, status: Option<TaskStatus>)
    -> Result<Vec<TaskRecord>, TreadleError>;

    async fn counts_by_status(&self) -> Result<StatusCounts, TreadleError>;
}
