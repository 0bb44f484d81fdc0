use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{TaskId, TaskStatus, TreadleError};

/// Name of the handler variant that owns a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A stored task row.
///
/// `value` is opaque to the store; only the handler registered for
/// `task_type` knows its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub value: serde_json::Value,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TaskRecord {
    /// A freshly inserted, pending record.
    pub fn new(
        id: TaskId,
        task_type: TaskType,
        value: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_type,
            status: TaskStatus::Pending,
            value,
            create_time: now,
            update_time: now,
        }
    }

    /// Apply a status change along the state machine, keeping
    /// `update_time >= create_time`.
    pub fn try_transition(
        &mut self,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TreadleError> {
        if !self.status.can_transition_to(status) {
            return Err(TreadleError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.update_time = now.max(self.create_time);
        Ok(())
    }
}
