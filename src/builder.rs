//! Forward pass: value graph → atoms and relations.
//!
//! The builder walks a root [`Value`] depth-first, asking the
//! [`HandlerRegistry`] for the handler of each node. Handlers recurse into
//! children through the [`Walker`] capability.
//!
//! ## Algorithm
//!
//! 1. Fresh per-build state: identity map, atom and relation accumulators, depth 0
//! 2. `walk(value)`:
//!    - identity already mapped → return its atom id, no further work
//!    - depth > `max_depth` → `DepthExceeded`, aborting the build
//!    - assign the atom id and record it in the identity map
//!    - resolve a handler and decompose; children are walked from inside
//!    - malformed decomposition → single orphan atom
//!    - attach the type hierarchy to the primary atom, accumulate
//! 3. Deduplicate atoms, group relations by name, build the type directory
//!
//! The id is recorded before any child is walked, so a value that reaches
//! itself gets its own id back instead of recursing forever.
//!
//! ## Determinism Guarantees
//!
//! - Container ids are `n0, n1, ...` in first-visit order
//! - Scalar ids are derived from type and value, so equal scalars share one atom
//! - Same value graph + same policy + same registry → identical fingerprint

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::annotations::{AnnotationSource, Annotations, NoAnnotations};
use crate::canonical::text_hash;
use crate::policy::{BuildPolicyV1, PolicyError};
use crate::relationalizers::{
    DecomposeError, Decomposition, FallbackRelationalizer, HandlerRegistry, Relationalizer, Walker,
};
use crate::types::{Atom, DataInstance, Relation, Value};

/// Error type for build operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The value graph is nested deeper than the policy allows.
    #[error("Maximum recursion depth exceeded: depth {depth} > max_depth {max_depth}")]
    DepthExceeded {
        /// Depth of the value that was rejected.
        depth: usize,
        /// Configured ceiling.
        max_depth: usize,
    },
    /// The policy failed validation.
    #[error("Invalid build policy: {0}")]
    InvalidPolicy(#[from] PolicyError),
}

/// Result of one build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Atom id of the root value.
    pub root_id: String,
    /// The atom/relation graph.
    pub instance: DataInstance,
    /// Annotations merged across every visited identity.
    pub annotations: Annotations,
    /// `params_hash` of the policy the graph was built under.
    pub policy_hash: String,
    /// Exchange format version the instance conforms to.
    pub schema_version: String,
}

/// Forward-pass graph builder.
///
/// Holds only shared, read-only configuration; all traversal state lives in
/// a per-call walk, so one builder can serve concurrent builds.
#[derive(Clone)]
pub struct GraphBuilder {
    registry: Arc<HandlerRegistry>,
    policy: BuildPolicyV1,
    annotations: Arc<dyn AnnotationSource>,
}

impl GraphBuilder {
    /// Create a builder over a registry.
    pub fn new(registry: Arc<HandlerRegistry>, policy: BuildPolicyV1) -> Self {
        Self {
            registry,
            policy,
            annotations: Arc::new(NoAnnotations),
        }
    }

    /// Replace the policy.
    pub fn with_policy(mut self, policy: BuildPolicyV1) -> Self {
        self.policy = policy;
        self
    }

    /// Attach an annotation source.
    pub fn with_annotations(mut self, source: Arc<dyn AnnotationSource>) -> Self {
        self.annotations = source;
        self
    }

    /// Build the atom/relation graph of `value`.
    pub fn build(&self, value: &Value) -> Result<BuildOutput, BuildError> {
        self.policy.validate()?;

        let mut walk = GraphWalk::new(&self.registry, &self.policy, self.annotations.as_ref());
        let root_id = walk.walk_value(value)?;
        let GraphWalk {
            atoms,
            relations,
            collected,
            pinned,
            ..
        } = walk;

        let instance = DataInstance::assemble(atoms, relations);
        debug!(
            root = %root_id,
            policy = %self.policy.policy_id(),
            identities = pinned.len(),
            atoms = instance.num_atoms(),
            relations = instance.relations.len(),
            tuples = instance.num_tuples(),
            "Built data instance"
        );

        Ok(BuildOutput {
            root_id,
            instance,
            annotations: collected,
            policy_hash: self.policy.params_hash(),
            schema_version: crate::EXCHANGE_SCHEMA_VERSION.to_string(),
        })
    }

    /// Get the policy.
    pub fn policy(&self) -> &BuildPolicyV1 {
        &self.policy
    }

    /// Get the handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Reference(usize),
    Primitive(String),
}

/// Value-derived id of a scalar.
fn primitive_id(value: &Value) -> Option<String> {
    let text = value.primitive_text()?;
    let type_name = value.type_name();
    Some(match value {
        Value::Null | Value::Bool(_) | Value::Int(_) => format!("{}:{}", type_name, text),
        _ => format!("{}:{:016x}", type_name, text_hash(&text)),
    })
}

/// Transient state of one build.
struct GraphWalk<'a> {
    registry: &'a HandlerRegistry,
    policy: &'a BuildPolicyV1,
    annotations: &'a dyn AnnotationSource,
    seen: HashMap<IdentityKey, String>,
    /// Holds a handle to every mapped allocation so its address cannot be
    /// reused by a temporary value while the walk is running.
    pinned: Vec<Value>,
    /// Identity keys in registration order, for undoing a failed handler.
    journal: Vec<IdentityKey>,
    frames: Vec<String>,
    atoms: Vec<Atom>,
    relations: Vec<Relation>,
    collected: Annotations,
    depth: usize,
    next_id: u64,
}

impl<'a> GraphWalk<'a> {
    fn new(
        registry: &'a HandlerRegistry,
        policy: &'a BuildPolicyV1,
        annotations: &'a dyn AnnotationSource,
    ) -> Self {
        Self {
            registry,
            policy,
            annotations,
            seen: HashMap::new(),
            pinned: Vec::new(),
            journal: Vec::new(),
            frames: Vec::new(),
            atoms: Vec::new(),
            relations: Vec::new(),
            collected: Annotations::default(),
            depth: 0,
            next_id: 0,
        }
    }

    fn identity_key(&self, value: &Value) -> Option<IdentityKey> {
        match value.identity() {
            Some(addr) => Some(IdentityKey::Reference(addr)),
            None if self.policy.primitive_collapsing => primitive_id(value).map(IdentityKey::Primitive),
            None => None,
        }
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("n{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn register(&mut self, key: Option<IdentityKey>, value: &Value) -> String {
        let Some(key) = key else {
            return self.fresh_id();
        };
        if let Some(id) = self.seen.get(&key) {
            return id.clone();
        }
        let id = match &key {
            IdentityKey::Primitive(pid) => pid.clone(),
            IdentityKey::Reference(_) => {
                self.pinned.push(value.clone());
                self.fresh_id()
            }
        };
        self.journal.push(key.clone());
        self.seen.insert(key, id.clone());
        id
    }

    /// Drop everything emitted since `mark`, including identity entries,
    /// so the values a failed handler walked are decomposed afresh when
    /// reached again.
    fn rollback(&mut self, mark: WalkMark) {
        self.atoms.truncate(mark.atoms);
        self.relations.truncate(mark.relations);
        for key in self.journal.drain(mark.journal..) {
            self.seen.remove(&key);
        }
    }

    fn mark(&self) -> WalkMark {
        WalkMark {
            atoms: self.atoms.len(),
            relations: self.relations.len(),
            journal: self.journal.len(),
        }
    }

    fn walk_value(&mut self, value: &Value) -> Result<String, BuildError> {
        let key = self.identity_key(value);
        if let Some(id) = key.as_ref().and_then(|k| self.seen.get(k)) {
            trace!(atom_id = %id, "Identity already walked");
            return Ok(id.clone());
        }

        if self.depth > self.policy.max_depth {
            return Err(BuildError::DepthExceeded {
                depth: self.depth,
                max_depth: self.policy.max_depth,
            });
        }

        let id = self.register(key, value);
        self.collected.merge(self.annotations.collect_for(value));

        let handler = self.registry.resolve(value);
        let mark = self.mark();
        self.frames.push(id.clone());
        self.depth += 1;
        let outcome = match &handler {
            Some(h) => h.relationalize(value, self),
            None => FallbackRelationalizer.relationalize(value, self),
        };
        self.depth -= 1;
        self.frames.pop();

        let handler_name = handler
            .as_ref()
            .map(|h| h.name().to_string())
            .unwrap_or_else(|| FallbackRelationalizer.name().to_string());
        let decomposition = match outcome {
            Ok(d) if d.atoms.iter().any(|a| a.id == id) => d,
            Ok(_) => {
                warn!(handler = %handler_name, atom_id = %id, "Handler emitted no primary atom, using orphan atom");
                self.rollback(mark);
                orphan(&id, value)
            }
            Err(DecomposeError::Malformed(reason)) => {
                warn!(handler = %handler_name, atom_id = %id, %reason, "Decomposition failed, using orphan atom");
                self.rollback(mark);
                orphan(&id, value)
            }
            Err(DecomposeError::Build(e)) => return Err(e),
        };

        let hierarchy = value.type_hierarchy();
        for mut atom in decomposition.atoms {
            if atom.id == id {
                if let Some(most_specific) = hierarchy.first() {
                    atom.atom_type = most_specific.clone();
                }
                atom.type_hierarchy = Some(hierarchy.clone());
            }
            self.atoms.push(atom);
        }
        self.relations.extend(decomposition.relations);

        Ok(id)
    }
}

#[derive(Debug, Clone, Copy)]
struct WalkMark {
    atoms: usize,
    relations: usize,
    journal: usize,
}

fn orphan(id: &str, value: &Value) -> Decomposition {
    let type_name = value.type_name();
    Decomposition::single(Atom::new(id, type_name.clone(), type_name))
}

impl Walker for GraphWalk<'_> {
    fn walk(&mut self, value: &Value) -> Result<String, BuildError> {
        self.walk_value(value)
    }

    fn current_id(&self) -> String {
        self.frames.last().cloned().unwrap_or_default()
    }

    fn policy(&self) -> &BuildPolicyV1 {
        self.policy
    }
}
