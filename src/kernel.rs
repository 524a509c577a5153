//! Caller-facing facade over both passes.
//!
//! A [`DataInstanceBuilder`] bundles a handler registry, a build policy, an
//! annotation source and a custom-reconstructor table. `build` runs the
//! forward pass; `reify` inverts it.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::annotations::{AnnotationSource, Annotations};
use crate::builder::{BuildError, BuildOutput, GraphBuilder};
use crate::policy::BuildPolicyV1;
use crate::reify::{self, AtomRelations, Reconstructor, ReconstructorRegistry, ReifyContext, ReifyError};
use crate::relationalizers::{HandlerRegistry, Relationalizer};
use crate::types::{Atom, DataInstance, Value};

/// Bidirectional value ↔ atom/relation converter.
///
/// ## Example
///
/// ```
/// use relationalizer_kernel::{DataInstanceBuilder, Value};
///
/// let builder = DataInstanceBuilder::new();
/// let value = Value::list(vec![Value::from(1), Value::from("a")]);
///
/// let instance = builder.build(&value).unwrap();
/// let json = instance.to_json().unwrap();
/// assert_eq!(builder.reify(&json).unwrap(), value);
/// ```
pub struct DataInstanceBuilder {
    graph: GraphBuilder,
    reconstructors: ReconstructorRegistry,
    collected: Mutex<Annotations>,
}

impl DataInstanceBuilder {
    /// Create a builder over the process-wide handler registry.
    pub fn new() -> Self {
        Self::with_registry(HandlerRegistry::global())
    }

    /// Create a builder over a specific handler registry.
    pub fn with_registry(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            graph: GraphBuilder::new(registry, BuildPolicyV1::default()),
            reconstructors: ReconstructorRegistry::new(),
            collected: Mutex::new(Annotations::default()),
        }
    }

    /// Replace the build policy.
    pub fn with_policy(mut self, policy: BuildPolicyV1) -> Self {
        self.graph = self.graph.with_policy(policy);
        self
    }

    /// Attach an annotation source.
    pub fn with_annotations(mut self, source: Arc<dyn AnnotationSource>) -> Self {
        self.graph = self.graph.with_annotations(source);
        self
    }

    /// Build the atom/relation graph of `value`.
    ///
    /// Annotations from this build replace those of the previous one.
    pub fn build(&self, value: &Value) -> Result<DataInstance, BuildError> {
        let BuildOutput {
            instance,
            annotations,
            ..
        } = self.graph.build(value)?;
        *self.collected.lock() = annotations;
        Ok(instance)
    }

    /// Build and return the full output, including root id and annotations.
    pub fn build_output(&self, value: &Value) -> Result<BuildOutput, BuildError> {
        let output = self.graph.build(value)?;
        *self.collected.lock() = output.annotations.clone();
        Ok(output)
    }

    /// Annotations collected by the most recent build.
    pub fn get_collected(&self) -> Annotations {
        self.collected.lock().clone()
    }

    /// Reconstruct a value from exchange data in JSON form.
    pub fn reify(&self, data: &serde_json::Value) -> Result<Value, ReifyError> {
        reify::reify(data, &self.reconstructors)
    }

    /// Reconstruct a value from a typed instance.
    pub fn reify_instance(&self, instance: &DataInstance) -> Result<Value, ReifyError> {
        reify::reify_instance(instance, &self.reconstructors)
    }

    /// Whether `data` passes the reconstruction preconditions.
    pub fn can_reify(&self, data: &serde_json::Value) -> bool {
        reify::can_reify(data)
    }

    /// Register a closure reconstructor for a declared type.
    pub fn register_reifier<F>(&self, type_name: impl Into<String>, f: F)
    where
        F: Fn(&Atom, &AtomRelations, &mut ReifyContext<'_>) -> Result<Value, ReifyError>
            + Send
            + Sync
            + 'static,
    {
        self.reconstructors.register_fn(type_name, f);
    }

    /// Register a reconstructor object for a declared type.
    pub fn register_reconstructor(&self, type_name: impl Into<String>, reconstructor: Arc<dyn Reconstructor>) {
        self.reconstructors.register(type_name, reconstructor);
    }

    /// Remove the reconstructor for a type. Returns whether one was present.
    pub fn unregister_reifier(&self, type_name: &str) -> bool {
        self.reconstructors.unregister(type_name)
    }

    /// Types with a registered reconstructor.
    pub fn list_reifiers(&self) -> BTreeSet<String> {
        self.reconstructors.list_registered()
    }

    /// Decompose this one value with `handler`. Returns `false` for scalars.
    ///
    /// The override lives in the handler registry, so builders sharing the
    /// registry see it too.
    pub fn set_object_handler(&self, value: &Value, handler: Arc<dyn Relationalizer>) -> bool {
        self.graph.registry().set_object_handler(value, handler)
    }

    /// Handler overriding resolution for this value, if any.
    pub fn object_handler(&self, value: &Value) -> Option<Arc<dyn Relationalizer>> {
        self.graph.registry().object_handler(value)
    }

    /// Drop the override of this value.
    pub fn clear_object_handler(&self, value: &Value) -> bool {
        self.graph.registry().clear_object_handler(value)
    }

    /// Get the handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.graph.registry()
    }

    /// Get the build policy.
    pub fn policy(&self) -> &BuildPolicyV1 {
        self.graph.policy()
    }
}

impl Default for DataInstanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataInstanceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataInstanceBuilder")
            .field("graph", &self.graph)
            .field("reconstructors", &self.reconstructors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Object;
    use serde_json::json;

    fn local() -> DataInstanceBuilder {
        DataInstanceBuilder::with_registry(Arc::new(HandlerRegistry::with_builtins()))
    }

    #[test]
    fn test_build_and_reify() {
        let builder = local();
        let value = Value::map(vec![(Value::from("k"), Value::list(vec![Value::from(true)]))]);
        let instance = builder.build(&value).unwrap();

        assert_eq!(builder.reify_instance(&instance).unwrap(), value);
        let json = instance.to_json().unwrap();
        assert!(builder.can_reify(&json));
        assert_eq!(builder.reify(&json).unwrap(), value);
    }

    #[test]
    fn test_collected_tracks_last_build() {
        let source = |value: &Value| {
            let mut a = Annotations::default();
            if value.type_name() == "Tree" {
                a.directives.push(json!({"atomColor": {"selector": "Tree", "value": "green"}}));
            }
            a
        };
        let builder = local().with_annotations(Arc::new(source));

        builder.build(&Value::object(Object::new("Tree"))).unwrap();
        assert_eq!(builder.get_collected().directives.len(), 1);

        builder.build(&Value::from(1)).unwrap();
        assert!(builder.get_collected().is_empty());
    }

    #[test]
    fn test_reifier_registration() {
        let builder = local();
        builder.register_reifier("Celsius", |atom, _relations, _ctx| {
            Ok(Value::Float(atom.label.trim_end_matches('C').parse().unwrap_or(0.0)))
        });
        assert!(builder.list_reifiers().contains("Celsius"));
        assert!(builder.unregister_reifier("Celsius"));
        assert!(builder.list_reifiers().is_empty());
    }

    #[test]
    fn test_with_policy_keeps_registry() {
        let registry = Arc::new(HandlerRegistry::new());
        let builder = DataInstanceBuilder::with_registry(Arc::clone(&registry))
            .with_policy(BuildPolicyV1::with_max_depth(3));
        assert!(Arc::ptr_eq(builder.registry(), &registry));
        assert_eq!(builder.policy().max_depth, 3);
    }
}
