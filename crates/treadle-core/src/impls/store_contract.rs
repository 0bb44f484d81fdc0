//! Behaviour every `TaskStore` implementation must share.
//!
//! Each store's test module calls these against its own instance.

use chrono::Duration;

use crate::domain::{TaskId, TaskStatus, TaskType, TreadleError};
use crate::ports::{Clock, FixedClock, TaskStore};

pub async fn add_then_fetch_includes_new_pending_task(store: &dyn TaskStore) {
    let id = store
        .add_task(TaskType::new("print"), serde_json::json!({"message": "hello"}))
        .await
        .unwrap();

    let pending = store.fetch_pending().await.unwrap();
    let record = pending.iter().find(|r| r.id == id).unwrap();
    assert_eq!(record.status, TaskStatus::Pending);
    assert_eq!(record.task_type.as_str(), "print");
    assert_eq!(record.value["message"], "hello");
    assert_eq!(record.create_time, record.update_time);
}

pub async fn fetch_is_ordered_by_create_time(store: &dyn TaskStore, clock: &FixedClock) {
    let t0 = clock.now();
    clock.set(t0 + Duration::seconds(10));
    let late = store.add_task(TaskType::new("late"), serde_json::json!({})).await.unwrap();
    clock.set(t0);
    let early = store.add_task(TaskType::new("early"), serde_json::json!({})).await.unwrap();
    let tie = store.add_task(TaskType::new("tie"), serde_json::json!({})).await.unwrap();

    let ids: Vec<TaskId> = store
        .fetch_pending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![early, tie, late]);

    let pending = store.fetch_pending().await.unwrap();
    assert!(pending.windows(2).all(|w| w[0].create_time <= w[1].create_time));
}

pub async fn fetch_excludes_non_pending(store: &dyn TaskStore) {
    assert!(store.fetch_pending().await.unwrap().is_empty());

    let running = store.add_task(TaskType::new("a"), serde_json::json!({})).await.unwrap();
    let testing = store.add_task(TaskType::new("b"), serde_json::json!({})).await.unwrap();
    let pending = store.add_task(TaskType::new("c"), serde_json::json!({})).await.unwrap();
    store.update_status(running, TaskStatus::Running).await.unwrap();
    store.update_status(testing, TaskStatus::Testing).await.unwrap();

    let fetched = store.fetch_pending().await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, pending);
    assert!(fetched.iter().all(|r| r.status == TaskStatus::Pending));
}

pub async fn missing_ids_are_reported(store: &dyn TaskStore) {
    let missing = TaskId::new(404);
    assert!(matches!(
        store.get_task(missing).await,
        Err(TreadleError::TaskNotFound(id)) if id == missing
    ));
    assert!(matches!(
        store.update_status(missing, TaskStatus::Running).await,
        Err(TreadleError::TaskNotFound(id)) if id == missing
    ));
}

pub async fn transitions_are_compare_and_set(store: &dyn TaskStore) {
    let id = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();

    let err = store.update_status(id, TaskStatus::Done).await.unwrap_err();
    assert!(matches!(
        err,
        TreadleError::InvalidTransition { from: TaskStatus::Pending, to: TaskStatus::Done, .. }
    ));

    store.update_status(id, TaskStatus::Testing).await.unwrap();
    // a scheduler that fetched the row before the probe claimed it loses the race
    let err = store.update_status(id, TaskStatus::Running).await.unwrap_err();
    assert!(matches!(
        err,
        TreadleError::InvalidTransition { from: TaskStatus::Testing, to: TaskStatus::Running, .. }
    ));

    store.update_status(id, TaskStatus::TestFailed).await.unwrap();
    assert_eq!(store.get_task(id).await.unwrap().status, TaskStatus::TestFailed);

    let err = store.update_status(id, TaskStatus::Pending).await.unwrap_err();
    assert!(matches!(err, TreadleError::InvalidTransition { .. }));
}

pub async fn update_time_never_precedes_create_time(store: &dyn TaskStore, clock: &FixedClock) {
    let t0 = clock.now();
    let id = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();

    clock.set(t0 + Duration::seconds(3));
    store.update_status(id, TaskStatus::Running).await.unwrap();
    let record = store.get_task(id).await.unwrap();
    assert_eq!(record.create_time, t0);
    assert_eq!(record.update_time, t0 + Duration::seconds(3));

    // a clock stepping backwards must not produce update_time < create_time
    clock.set(t0 - Duration::seconds(60));
    store.update_status(id, TaskStatus::Done).await.unwrap();
    let record = store.get_task(id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Done);
    assert!(record.update_time >= record.create_time);
}

pub async fn listing_and_counts(store: &dyn TaskStore) {
    let a = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();
    let b = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();
    let c = store.add_task(TaskType::new("print"), serde_json::json!({})).await.unwrap();
    store.update_status(b, TaskStatus::Running).await.unwrap();
    store.update_status(b, TaskStatus::Failed).await.unwrap();

    let all: Vec<TaskId> = store
        .list_tasks(None)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(all, vec![a, b, c]);

    let failed = store.list_tasks(Some(TaskStatus::Failed)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, b);

    let counts = store.counts_by_status().await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.total(), 3);
}
