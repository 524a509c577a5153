//! Pluggable decomposition handlers ("relationalizers").
//!
//! A relationalizer turns one runtime [`Value`] into atoms and relations.
//! Nested values are decomposed through the [`Walker`] capability, which
//! returns the atom id of each child and collapses aliases and cycles.
//!
//! ## Built-in handlers
//!
//! | Handler | Priority | Shape |
//! |---------|----------|-------|
//! | primitive | 10 | one atom, value-derived id |
//! | mapping | 9 | `kv(map, key, value)` per entry |
//! | sequence | 8 | `idx(list, index, element)` per position |
//! | tuple | 8 | `t{i}(tuple, element)` per position |
//! | set | 8 | `contains(set, element)` per element |
//! | record | 7 | `field(record, value)` per declared field |
//! | object | 5 | `attr(object, value)` per data attribute |
//! | fallback | 1 | one atom, no relations |
//!
//! Priorities below [`RESERVED_PRIORITY_CEILING`] belong to built-ins.

pub mod registry;
pub mod primitive;
pub mod mapping;
pub mod sequence;
pub mod tuple;
pub mod set;
pub mod record;
pub mod object;
pub mod fallback;

use std::sync::Arc;

use crate::builder::BuildError;
use crate::policy::BuildPolicyV1;
use crate::types::{Atom, Relation, RelationError, Value};

pub use registry::{HandlerRegistry, RESERVED_PRIORITY_CEILING};
pub use primitive::PrimitiveRelationalizer;
pub use mapping::MappingRelationalizer;
pub use sequence::SequenceRelationalizer;
pub use tuple::TupleRelationalizer;
pub use set::SetRelationalizer;
pub use record::RecordRelationalizer;
pub use object::ObjectRelationalizer;
pub use fallback::FallbackRelationalizer;

/// Atoms and relations produced for one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposition {
    /// Atoms; exactly one must carry the walker's current id.
    pub atoms: Vec<Atom>,
    /// Relations connecting this value to its children.
    pub relations: Vec<Relation>,
}

impl Decomposition {
    /// A single atom with no relations.
    pub fn single(atom: Atom) -> Self {
        Self {
            atoms: vec![atom],
            relations: Vec::new(),
        }
    }

    /// Create from parts.
    pub fn new(atoms: Vec<Atom>, relations: Vec<Relation>) -> Self {
        Self { atoms, relations }
    }
}

/// Outcome of a failed decomposition.
#[derive(Debug, thiserror::Error)]
pub enum DecomposeError {
    /// The value is malformed; the builder degrades it to an orphan atom.
    #[error("Malformed value: {0}")]
    Malformed(String),
    /// A nested walk failed; aborts the whole build.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl From<RelationError> for DecomposeError {
    fn from(e: RelationError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Capability handed to relationalizers for recursive decomposition.
pub trait Walker {
    /// Decompose a nested value and return its atom id.
    fn walk(&mut self, value: &Value) -> Result<String, BuildError>;

    /// Atom id of the value currently being decomposed.
    fn current_id(&self) -> String;

    /// Policy of the running build.
    fn policy(&self) -> &BuildPolicyV1;
}

/// Decomposition handler for one category of runtime value.
pub trait Relationalizer: Send + Sync {
    /// Name used in logs and registry listings.
    fn name(&self) -> &str;

    /// Whether this handler accepts `value`. Must be side-effect free.
    fn can_handle(&self, value: &Value) -> bool;

    /// Convert `value` into atoms and relations.
    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError>;
}

/// Whether a field or attribute name is private.
pub(crate) fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

/// Built-in handlers with their priorities, in registration order.
pub fn builtin_relationalizers() -> Vec<(Arc<dyn Relationalizer>, i32)> {
    vec![
        (Arc::new(PrimitiveRelationalizer) as Arc<dyn Relationalizer>, 10),
        (Arc::new(MappingRelationalizer), 9),
        (Arc::new(SequenceRelationalizer), 8),
        (Arc::new(TupleRelationalizer), 8),
        (Arc::new(SetRelationalizer), 8),
        (Arc::new(RecordRelationalizer), 7),
        (Arc::new(ObjectRelationalizer), 5),
        (Arc::new(FallbackRelationalizer), 1),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal walker for exercising handlers in isolation.

    use super::*;
    use std::collections::HashMap;

    pub struct RecordingWalker {
        pub policy: BuildPolicyV1,
        pub current: String,
        pub walked: Vec<Value>,
        ids: HashMap<usize, String>,
        next: usize,
    }

    impl RecordingWalker {
        pub fn new(current: &str) -> Self {
            Self {
                policy: BuildPolicyV1::default(),
                current: current.to_string(),
                walked: Vec::new(),
                ids: HashMap::new(),
                next: 0,
            }
        }

        fn id_for(&mut self, value: &Value) -> String {
            if let Some(text) = value.primitive_text() {
                return format!("{}:{}", value.type_name(), text);
            }
            let key = value.identity().unwrap_or(usize::MAX);
            if let Some(id) = self.ids.get(&key) {
                return id.clone();
            }
            let id = format!("c{}", self.next);
            self.next += 1;
            self.ids.insert(key, id.clone());
            id
        }
    }

    impl Walker for RecordingWalker {
        fn walk(&mut self, value: &Value) -> Result<String, BuildError> {
            self.walked.push(value.clone());
            Ok(self.id_for(value))
        }

        fn current_id(&self) -> String {
            self.current.clone()
        }

        fn policy(&self) -> &BuildPolicyV1 {
            &self.policy
        }
    }
}
