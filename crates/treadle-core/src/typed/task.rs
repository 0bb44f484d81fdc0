//! Task trait - binds a payload type to its task-type name.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Task ties a payload schema to the handler-type name stored in the `type`
/// column.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Greeting {
///     message: String,
/// }
///
/// impl Task for Greeting {
///     const TYPE: &'static str = "greeting";
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize`: packing arguments into the stored payload
/// - `DeserializeOwned`: decoding the stored payload at dispatch
/// - `Send + Sync + 'static`: handlers are shared across tokio tasks
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}
