//! # relationalizer-kernel
//!
//! Bidirectional conversion between in-memory value graphs and a flat,
//! typed atom/relation graph.
//!
//! The kernel answers two questions:
//!
//! > Given a value, which atoms and relations describe it, **without losing
//! > aliasing or cycles**?
//!
//! > Given those atoms and relations, which value did they come from?
//!
//! ## Core Contract
//!
//! 1. Decompose a value through priority-ordered handlers ("relationalizers")
//! 2. One atom per distinct identity; aliases and cycles collapse onto it
//! 3. Export the graph as a stable exchange record (atoms, relations, types)
//! 4. Reconstruct values from that record, with caller-supplied reconstructors
//!
//! ## Architecture
//!
//! ```text
//! Value → HandlerRegistry → GraphBuilder → DataInstance → JSON
//!                                                ↓
//! Value ← ReconstructorRegistry ← reify ← AtomGraph
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same value graph + same policy + same registry → identical fingerprint
//! - Handler resolution is stable for equal priorities (registration order)
//! - Relations are grouped by name in first-seen order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod canonical;
pub mod relationalizers;
pub mod annotations;
pub mod builder;
pub mod reify;
pub mod kernel;

// Re-exports
pub use types::{
    Atom, AtomRef, DataInstance, Function, Object, Opaque, Record, RecordSchema, Relation,
    RelationError, RelationRecord, RelationTuple, TypeEntry, TypeMeta, Value, MIN_ARITY,
};
pub use policy::{BuildPolicyV1, PolicyError, DEFAULT_MAX_DEPTH};
pub use relationalizers::{
    DecomposeError, Decomposition, HandlerRegistry, Relationalizer, Walker,
    RESERVED_PRIORITY_CEILING,
};
pub use annotations::{AnnotationSource, Annotations, NoAnnotations};
pub use builder::{BuildError, BuildOutput, GraphBuilder};
pub use reify::{
    can_reify, AtomGraph, AtomRelations, Reconstructor, ReconstructorRegistry, ReifyContext,
    ReifyError,
};
pub use kernel::DataInstanceBuilder;
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};

/// Schema version of the exchange format.
/// Increment on breaking changes to any exchange type.
pub const EXCHANGE_SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "build_policy_v1";
