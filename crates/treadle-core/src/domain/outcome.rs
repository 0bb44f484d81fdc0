//! Outcome model: the result shape of a bounded handler run.
//!
//! This module does not know about stores or statuses. The feasibility probe
//! maps a `BoundedOutcome` to a verdict through a policy function, so the
//! "timed out means feasible" rule lives in one visible place.

use serde::{Deserialize, Serialize};

/// Classification of an attempt, serialized as COMPLETED / TIMED_OUT / FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Completed,
    TimedOut,
    Failed,
}

/// Three-way result of running a handler under a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundedOutcome {
    /// The handler returned normally before the deadline.
    Completed,

    /// The deadline elapsed first (or the handler reported its own timeout).
    TimedOut,

    /// The handler raised before the deadline.
    Failed(String),
}

impl BoundedOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            BoundedOutcome::Completed => OutcomeKind::Completed,
            BoundedOutcome::TimedOut => OutcomeKind::TimedOut,
            BoundedOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }
}

/// Maps a bounded outcome to "is this task feasible?".
pub type FeasibilityPolicy = fn(&BoundedOutcome) -> bool;

/// Default policy: anything that did not fail before the deadline is feasible.
///
/// A task that would fail after the bound is misclassified as feasible; this is
/// the intended heuristic, not an oversight.
pub fn timed_out_is_feasible(outcome: &BoundedOutcome) -> bool {
    !matches!(outcome, BoundedOutcome::Failed(_))
}

/// Stricter policy: only a run that actually completed counts.
pub fn completion_required(outcome: &BoundedOutcome) -> bool {
    matches!(outcome, BoundedOutcome::Completed)
}
