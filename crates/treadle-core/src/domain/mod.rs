//! Domain model (ids, task rows, statuses, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;

pub use self::errors::TreadleError;
pub use self::ids::TaskId;
pub use self::outcome::{
    BoundedOutcome, FeasibilityPolicy, OutcomeKind, completion_required, timed_out_is_feasible,
};
pub use self::state::{ParseStatusError, StatusCounts, TaskStatus};
pub use self::task::{TaskRecord, TaskType};
