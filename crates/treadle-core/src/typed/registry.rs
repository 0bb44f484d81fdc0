//! HandlerRegistry - task type to handler lookup.
//!
//! Filled once while the app is built, then shared read-only behind an `Arc`.
//! There is no way to add handlers after `AppBuilder::build`.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;
use crate::domain::TreadleError;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(T::TYPE) {
            return Err(RegistryError::AlreadyRegistered(T::TYPE.to_string()));
        }
        self.handlers
            .insert(T::TYPE, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Like `get`, but a missing type is an `UnknownHandlerType` error.
    pub fn resolve(&self, task_type: &str) -> Result<Arc<dyn DynHandler>, TreadleError> {
        self.get(task_type)
            .ok_or_else(|| TreadleError::UnknownHandlerType(task_type.to_string()))
    }

    /// Registered task types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().map(|t| t.to_string()).collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::testing::{Boom, BoomHandler, Nap, NapHandler};

    #[test]
    fn test_register_and_resolve() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Nap, _>(NapHandler).unwrap();

        let handler = registry.resolve(Nap::TYPE).unwrap();
        assert_eq!(handler.task_type(), Nap::TYPE);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_registration() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Nap, _>(NapHandler).unwrap();
        let result = registry.register::<Nap, _>(NapHandler);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t == Nap::TYPE));
    }

    #[test]
    fn test_unknown_type() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("nope").is_none());
        let err = registry.resolve("nope").err().unwrap();
        assert!(matches!(err, TreadleError::UnknownHandlerType(t) if t == "nope"));
    }

    #[test]
    fn test_registered_types_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Nap, _>(NapHandler).unwrap();
        registry.register::<Boom, _>(BoomHandler).unwrap();
        assert_eq!(
            registry.registered_types(),
            vec![Boom::TYPE.to_string(), Nap::TYPE.to_string()]
        );
    }
}
