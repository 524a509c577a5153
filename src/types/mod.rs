//! Core types for the relationalizer kernel.

pub mod value;
pub mod atom;
pub mod relation;
pub mod instance;

pub use value::{Value, Shared, Record, RecordSchema, Object, Function, Opaque, shared, type_names};
pub use atom::Atom;
pub use relation::{Relation, RelationError, MIN_ARITY};
pub use instance::{DataInstance, RelationRecord, RelationTuple, TypeEntry, TypeMeta, AtomRef};
