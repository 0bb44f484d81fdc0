//! In-memory task store.
//!
//! Same contract as the SQLite store, minus durability. Used by tests and for
//! throwaway runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{StatusCounts, TaskId, TaskRecord, TaskStatus, TaskType, TreadleError};
use crate::ports::{Clock, SystemClock, TaskStore};

struct InMemoryStoreState {
    /// All task records (single source of truth).
    records: BTreeMap<TaskId, TaskRecord>,

    /// Next task ID to assign.
    next_task_id: i64,
}

impl InMemoryStoreState {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_task_id: 1,
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }
}

pub struct InMemoryTaskStore {
    state: Mutex<InMemoryStoreState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(InMemoryStoreState::new()),
            clock,
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn add_task(
        &self,
        task_type: TaskType,
        value: serde_json::Value,
    ) -> Result<TaskId, TreadleError> {
        let mut state = self.state.lock().await;
        let id = state.allocate_task_id();
        let record = TaskRecord::new(id, task_type, value, self.clock.now());
        state.records.insert(id, record);
        Ok(id)
    }

    async fn fetch_pending(&self) -> Result<Vec<TaskRecord>, TreadleError> {
        let state = self.state.lock().await;
        let mut pending: Vec<TaskRecord> = state
            .records
            .values()
            .filter(|record| record.status.is_runnable())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.create_time.cmp(&b.create_time).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), TreadleError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(TreadleError::TaskNotFound(id))?;
        record.try_transition(status, now)
    }

    async fn get_task(&self, id: TaskId) -> Result<TaskRecord, TreadleError> {
        let state = self.state.lock().await;
        state
            .records
            .get(&id)
            .cloned()
            .ok_or(TreadleError::TaskNotFound(id))
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskRecord>, TreadleError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .filter(|record| status.is_none_or(|s| record.status == s))
            .cloned()
            .collect())
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, TreadleError> {
        let state = self.state.lock().await;
        Ok(state.records.values().map(|record| record.status).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::store_contract;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn store_with_clock() -> (InMemoryTaskStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 7, 21, 22, 13, 0).unwrap(),
        ));
        (InMemoryTaskStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn add_then_fetch_includes_new_pending_task() {
        let (store, _) = store_with_clock();
        store_contract::add_then_fetch_includes_new_pending_task(&store).await;
    }

    #[tokio::test]
    async fn fetch_is_ordered_by_create_time() {
        let (store, clock) = store_with_clock();
        store_contract::fetch_is_ordered_by_create_time(&store, &clock).await;
    }

    #[tokio::test]
    async fn fetch_excludes_non_pending() {
        let (store, _) = store_with_clock();
        store_contract::fetch_excludes_non_pending(&store).await;
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let (store, _) = store_with_clock();
        store_contract::missing_ids_are_reported(&store).await;
    }

    #[tokio::test]
    async fn transitions_are_compare_and_set() {
        let (store, _) = store_with_clock();
        store_contract::transitions_are_compare_and_set(&store).await;
    }

    #[tokio::test]
    async fn update_time_tracks_clock_but_never_precedes_create_time() {
        let (store, clock) = store_with_clock();
        store_contract::update_time_never_precedes_create_time(&store, &clock).await;
    }

    #[tokio::test]
    async fn listing_and_counts() {
        let (store, _) = store_with_clock();
        store_contract::listing_and_counts(&store).await;
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let store = InMemoryTaskStore::new();
        let a = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();
        let b = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();
        assert!(b > a);
    }
}
