//! Ports - the seams between the core logic and the outside world.
//!
//! - `TaskStore`: durable task table (SQLite in production).
//! - `Clock`: time source for timestamps.
//! - `ProcessLogSink`: per-execution log files for spawned commands.

pub mod clock;
pub mod process_log;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::process_log::{ProcessLog, ProcessLogSink};
pub use self::task_store::TaskStore;
