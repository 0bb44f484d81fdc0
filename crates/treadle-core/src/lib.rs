//! treadle-core
//!
//! Core building blocks of the treadle job queue: a durable task table, a
//! sequential polling scheduler, and a bounded feasibility probe.
//!
//! # Modules
//! - **domain**: pure types (ids, task record, status machine, outcome, errors)
//! - **ports**: traits the rest depends on (TaskStore, Clock, ProcessLogSink)
//! - **impls**: SQLite and in-memory stores, filesystem process log
//! - **typed**: Task / Handler traits, type erasure, HandlerRegistry
//! - **handlers**: built-in print, training and evaluation handlers
//! - **app**: AppBuilder, Scheduler, FeasibilityProbe
//! - **config**: TOML configuration

pub mod app;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{
    App, AppBuilder, BuildError, FeasibilityProbe, Scheduler, SchedulerConfig, SchedulerReport,
};
pub use crate::config::TreadleConfig;
pub use crate::domain::{TaskId, TaskRecord, TaskStatus, TaskType, TreadleError};
pub use crate::handlers::HandlerKind;
pub use crate::impls::{FsProcessLog, InMemoryTaskStore, SqliteTaskStore};
pub use crate::ports::{ProcessLogSink, TaskStore};
