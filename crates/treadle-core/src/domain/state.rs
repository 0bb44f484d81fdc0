//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a stored task.
///
/// State transitions:
/// - Pending -> Running -> Done | Failed      (scheduler dispatch)
/// - Pending -> Testing -> TestSuccess | TestFailed   (feasibility probe)
///
/// `Done`, `Failed`, `TestSuccess` and `TestFailed` are terminal. There is no
/// edge back to `Pending`; re-running a finished task means enqueueing a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by the scheduler.
    Pending,

    /// Being executed by the scheduler.
    Running,

    /// Handler returned without error.
    Done,

    /// Handler raised, or no handler was registered for the task type.
    Failed,

    /// Being trial-run by the feasibility probe.
    Testing,

    /// Probe saw the handler fail before the deadline.
    TestFailed,

    /// Probe saw the handler complete, or outlive the deadline.
    TestSuccess,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Done,
        TaskStatus::Failed,
        TaskStatus::Testing,
        TaskStatus::TestFailed,
        TaskStatus::TestSuccess,
    ];

    /// Column value used by the persisted schema.
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Testing => "testing",
            TaskStatus::TestFailed => "test_failed",
            TaskStatus::TestSuccess => "test_success",
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::TestSuccess | TaskStatus::TestFailed
        )
    }

    /// Is this task eligible for a pending fetch?
    pub fn is_runnable(self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    pub fn can_transition_to(self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Done)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Pending, TaskStatus::Testing)
                | (TaskStatus::Testing, TaskStatus::TestSuccess)
                | (TaskStatus::Testing, TaskStatus::TestFailed)
        )
    }

    /// Statuses from which `self` may be entered.
    pub fn predecessors(self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Running | TaskStatus::Testing => &[TaskStatus::Pending],
            TaskStatus::Done | TaskStatus::Failed => &[TaskStatus::Running],
            TaskStatus::TestSuccess | TaskStatus::TestFailed => &[TaskStatus::Testing],
            TaskStatus::Pending => &[],
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub testing: usize,
    pub test_failed: usize,
    pub test_success: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus, n: usize) {
        *self.slot(status) += n;
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Running => self.running,
            TaskStatus::Done => self.done,
            TaskStatus::Failed => self.failed,
            TaskStatus::Testing => self.testing,
            TaskStatus::TestFailed => self.test_failed,
            TaskStatus::TestSuccess => self.test_success,
        }
    }

    pub fn total(&self) -> usize {
        TaskStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Running => &mut self.running,
            TaskStatus::Done => &mut self.done,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Testing => &mut self.testing,
            TaskStatus::TestFailed => &mut self.test_failed,
            TaskStatus::TestSuccess => &mut self.test_success,
        }
    }
}

impl FromIterator<TaskStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.add(status, 1);
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
