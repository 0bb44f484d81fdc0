//! Impls - adapters behind the ports.
//!
//! - **SqliteTaskStore**: the durable store
//! - **InMemoryTaskStore**: same contract, process lifetime only
//! - **FsProcessLog**: per-execution log files under a log root

pub mod fs_process_log;
pub mod inmem_store;
pub mod sqlite_store;

#[cfg(test)]
pub(crate) mod store_contract;

pub use self::fs_process_log::{FsProcessLog, file_stem};
pub use self::inmem_store::InMemoryTaskStore;
pub use self::sqlite_store::SqliteTaskStore;
