//! Typed - typed task API.
//!
//! Payload types carry their task-type name (`Task::TYPE`), so a handler and the
//! tasks it enqueues cannot disagree about it.
//!
//! # Two layers
//! - **Typed**: `Task`, `Handler<T>` - what handler authors implement
//! - **Dyn**: `DynHandler` - object-safe, what the registry stores

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, Handler, Invocation, TypedHandler};
pub use self::registry::{HandlerRegistry, RegistryError};
pub use self::task::Task;
