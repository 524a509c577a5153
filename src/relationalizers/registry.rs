//! Priority-ordered handler registry.
//!
//! Handlers are kept sorted by descending priority; ties keep registration
//! order. Resolution returns the first handler whose `can_handle` accepts the
//! value. A registry built with [`HandlerRegistry::with_builtins`] always
//! resolves, because the fallback handler accepts everything.
//!
//! A single value can also be given its own handler with
//! [`HandlerRegistry::set_object_handler`]. Such an override is keyed by the
//! value's identity and wins over every priority-ordered handler.
//!
//! ## Registration
//!
//! Registration is expected at start-up, before builds run. The registry is
//! read-only during a build; lookups take a shared lock and clone the handler
//! out, so handlers never run under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{builtin_relationalizers, Relationalizer};
use crate::types::Value;

/// Priorities below this value are reserved for built-in handlers.
pub const RESERVED_PRIORITY_CEILING: i32 = 100;

struct RegisteredHandler {
    priority: i32,
    handler: Arc<dyn Relationalizer>,
}

struct ObjectOverride {
    /// Keeps the allocation alive so its address is not reused.
    value: Value,
    handler: Arc<dyn Relationalizer>,
}

/// Priority-ordered collection of relationalizers.
pub struct HandlerRegistry {
    handlers: RwLock<Vec<RegisteredHandler>>,
    overrides: RwLock<HashMap<usize, ObjectOverride>>,
}

/// Process-wide default registry, seeded with the built-ins.
static GLOBAL_REGISTRY: Lazy<Arc<HandlerRegistry>> =
    Lazy::new(|| Arc::new(HandlerRegistry::with_builtins()));

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in handlers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (handler, priority) in builtin_relationalizers() {
            registry.insert(handler, priority);
        }
        registry
    }

    /// Shared process-wide registry.
    pub fn global() -> Arc<HandlerRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register a handler.
    ///
    /// Custom handlers should use a priority of at least
    /// [`RESERVED_PRIORITY_CEILING`]; lower priorities interleave with the
    /// built-ins and are logged.
    pub fn register(&self, handler: Arc<dyn Relationalizer>, priority: i32) {
        if priority < RESERVED_PRIORITY_CEILING {
            warn!(
                handler = handler.name(),
                priority,
                reserved_below = RESERVED_PRIORITY_CEILING,
                "Handler registered in the reserved built-in priority band"
            );
        }
        info!(handler = handler.name(), priority, "Registered relationalizer");
        self.insert(handler, priority);
    }

    fn insert(&self, handler: Arc<dyn Relationalizer>, priority: i32) {
        let mut handlers = self.handlers.write();
        handlers.push(RegisteredHandler { priority, handler });
        // Stable sort: equal priorities keep registration order.
        handlers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Use `handler` for this one value, whatever the registered handlers say.
    ///
    /// Returns `false` for scalars, which have no identity to key on. The
    /// registry holds a handle to `value` until the override is cleared.
    pub fn set_object_handler(&self, value: &Value, handler: Arc<dyn Relationalizer>) -> bool {
        let Some(identity) = value.identity() else {
            return false;
        };
        debug!(handler = handler.name(), value_type = %value.type_name(), "Set object handler");
        self.overrides.write().insert(
            identity,
            ObjectOverride {
                value: value.clone(),
                handler,
            },
        );
        true
    }

    /// Handler set for this value with [`set_object_handler`](Self::set_object_handler).
    pub fn object_handler(&self, value: &Value) -> Option<Arc<dyn Relationalizer>> {
        let identity = value.identity()?;
        self.overrides
            .read()
            .get(&identity)
            .filter(|entry| entry.value.same_identity(value))
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Remove the override of this value. Returns whether one was set.
    pub fn clear_object_handler(&self, value: &Value) -> bool {
        match value.identity() {
            Some(identity) => self.overrides.write().remove(&identity).is_some(),
            None => false,
        }
    }

    /// Find the handler responsible for `value`.
    ///
    /// A per-object override comes first, then the registered handlers in
    /// priority order.
    pub fn resolve(&self, value: &Value) -> Option<Arc<dyn Relationalizer>> {
        if let Some(handler) = self.object_handler(value) {
            return Some(handler);
        }
        self.handlers
            .read()
            .iter()
            .find(|entry| entry.handler.can_handle(value))
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// `(name, priority)` pairs in resolution order.
    pub fn entries(&self) -> Vec<(String, i32)> {
        self.handlers
            .read()
            .iter()
            .map(|entry| (entry.handler.name().to_string(), entry.priority))
            .collect()
    }

    /// Remove every handler and every per-object override.
    pub fn clear(&self) {
        self.handlers.write().clear();
        self.overrides.write().clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.entries())
            .field("object_overrides", &self.overrides.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::{DecomposeError, Decomposition, Walker};
    use crate::types::{Atom, Opaque};

    struct Named(&'static str, bool);

    impl Relationalizer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn can_handle(&self, _value: &Value) -> bool {
            self.1
        }

        fn relationalize(
            &self,
            value: &Value,
            walker: &mut dyn Walker,
        ) -> Result<Decomposition, DecomposeError> {
            Ok(Decomposition::single(Atom::new(walker.current_id(), value.type_name(), self.0)))
        }
    }

    #[test]
    fn test_builtin_resolution() {
        let registry = HandlerRegistry::with_builtins();
        let cases = [
            (Value::from(1), "primitive"),
            (Value::map(Vec::new()), "mapping"),
            (Value::list(Vec::new()), "sequence"),
            (Value::tuple(Vec::new()), "tuple"),
            (Value::set(Vec::new()), "set"),
            (Value::function("f"), "fallback"),
            (Value::opaque(Opaque::new("Socket")), "fallback"),
        ];
        for (value, expected) in cases {
            assert_eq!(registry.resolve(&value).unwrap().name(), expected);
        }
    }

    #[test]
    fn test_priority_order_and_ties() {
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(Named("low", true)), 100);
        registry.register(Arc::new(Named("high", true)), 200);
        registry.register(Arc::new(Named("high_second", true)), 200);

        let names: Vec<String> = registry.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["high", "high_second", "low"]);
        assert_eq!(registry.resolve(&Value::Null).unwrap().name(), "high");
    }

    #[test]
    fn test_custom_handler_overrides_builtin() {
        let registry = HandlerRegistry::with_builtins();
        registry.register(Arc::new(Named("custom", true)), 150);
        assert_eq!(registry.resolve(&Value::from("x")).unwrap().name(), "custom");
    }

    #[test]
    fn test_skips_handlers_that_decline() {
        let registry = HandlerRegistry::with_builtins();
        registry.register(Arc::new(Named("never", false)), 500);
        assert_eq!(registry.resolve(&Value::from(2)).unwrap().name(), "primitive");
    }

    #[test]
    fn test_empty_registry_resolves_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(&Value::Null).is_none());
    }

    #[test]
    fn test_clear() {
        let registry = HandlerRegistry::with_builtins();
        let value = Value::list(Vec::new());
        registry.set_object_handler(&value, Arc::new(Named("custom", true)));
        assert_eq!(registry.len(), 8);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.object_handler(&value).is_none());
    }

    #[test]
    fn test_object_handler_wins_for_that_value_only() {
        let registry = HandlerRegistry::with_builtins();
        registry.register(Arc::new(Named("high", true)), 1000);
        let marked = Value::list(vec![Value::from(1)]);
        let twin = Value::list(vec![Value::from(1)]);

        assert!(registry.set_object_handler(&marked, Arc::new(Named("mine", false))));
        assert_eq!(registry.resolve(&marked).unwrap().name(), "mine");
        assert_eq!(registry.resolve(&marked.clone()).unwrap().name(), "mine");
        assert_eq!(registry.resolve(&twin).unwrap().name(), "high");

        assert!(registry.clear_object_handler(&marked));
        assert!(!registry.clear_object_handler(&marked));
        assert_eq!(registry.resolve(&marked).unwrap().name(), "high");
    }

    #[test]
    fn test_object_handler_rejects_scalars() {
        let registry = HandlerRegistry::with_builtins();
        assert!(!registry.set_object_handler(&Value::from(3), Arc::new(Named("mine", true))));
        assert!(registry.object_handler(&Value::from(3)).is_none());
        assert_eq!(registry.resolve(&Value::from(3)).unwrap().name(), "primitive");
    }
}
