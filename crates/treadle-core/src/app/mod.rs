//! App - the application layer.
//!
//! Combines ports and the registry into the two dispatch paths.
//!
//! # Components
//! - **AppBuilder**: wiring and start-up validation
//! - **Scheduler**: sequential polling loop (fetch → Running → execute → Done/Failed)
//! - **FeasibilityProbe**: bounded trial run (Testing → TestSuccess/TestFailed)

pub mod builder;
pub mod probe;
pub mod scheduler;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::probe::{FeasibilityProbe, run_bounded};
pub use self::scheduler::{Scheduler, SchedulerConfig, SchedulerReport};
