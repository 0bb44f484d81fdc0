//! Handler trait - executes one task type.
//!
//! - `Handler<T>`: typed surface, one implementation per payload type
//! - `DynHandler`: object-safe erasure so the registry can hold mixed handlers
//! - `TypedHandler<T, H>`: adapter from the first to the second

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;

use super::task::Task;
use crate::domain::{TaskId, TaskType, TreadleError};
use crate::ports::TaskStore;

/// What a handler gets besides its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// The payload exactly as stored, for logging.
    pub payload: serde_json::Value,

    /// Give up waiting on external work after this long.
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Handler executes a `T` and can enqueue new ones.
///
/// `execute` returning `Ok(())` means "completed without error"; nothing else is
/// reported back to the caller.
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn execute(&self, task: T, invocation: &Invocation) -> Result<(), TreadleError>;

    /// Pack `task` into its payload schema and insert it as `Pending`.
    async fn enqueue(&self, store: &dyn TaskStore, task: T) -> Result<TaskId, TreadleError> {
        let value = serde_json::to_value(&task)
            .map_err(|e| TreadleError::InvalidPayload(e.to_string()))?;
        store.add_task(TaskType::new(T::TYPE), value).await
    }
}

/// Object-safe handler over raw payloads.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn execute_dyn(&self, invocation: Invocation) -> Result<(), TreadleError>;

    fn task_type(&self) -> &'static str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn execute_dyn(&self, invocation: Invocation) -> Result<(), TreadleError> {
        let task: T = serde_json::from_value(invocation.payload.clone())
            .map_err(|e| TreadleError::InvalidPayload(format!("{}: {e}", T::TYPE)))?;
        self.handler.execute(task, &invocation).await
    }

    fn task_type(&self) -> &'static str {
        T::TYPE
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Handlers with scripted behaviour for scheduler and probe tests.

    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use super::{Handler, Invocation};
    use crate::domain::TreadleError;
    use crate::typed::Task;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Nap {
        #[serde(default)]
        pub millis: u64,
    }

    impl Task for Nap {
        const TYPE: &'static str = "test.nap";
    }

    /// Sleeps for `millis` and succeeds.
    pub struct NapHandler;

    #[async_trait]
    impl Handler<Nap> for NapHandler {
        async fn execute(&self, task: Nap, _invocation: &Invocation) -> Result<(), TreadleError> {
            tokio::time::sleep(Duration::from_millis(task.millis)).await;
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Boom {
        #[serde(default)]
        pub exit_code: i32,
    }

    impl Task for Boom {
        const TYPE: &'static str = "test.boom";
    }

    /// Fails immediately, as a process exiting with `exit_code` would.
    pub struct BoomHandler;

    #[async_trait]
    impl Handler<Boom> for BoomHandler {
        async fn execute(&self, task: Boom, _invocation: &Invocation) -> Result<(), TreadleError> {
            Err(TreadleError::ProcessExecutionFailure {
                exit_code: Some(task.exit_code),
            })
        }
    }
}
