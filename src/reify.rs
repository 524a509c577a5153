//! Inverse pass: atoms and relations → value graph.
//!
//! ## Algorithm
//!
//! 1. Validate the exchange data up front (shape, non-empty atoms, arity,
//!    no dangling ids). Nothing is reconstructed from invalid input.
//! 2. Index relations by source atom: `source → name → [targets]`.
//! 3. Select the root (see [`AtomGraph::root`]).
//! 4. `reify_atom(id)`, memoized by atom id:
//!    - custom reconstructor registered for the atom's type
//!    - scalar types parsed from the label
//!    - built-in containers from their characteristic relations
//!    - anything else becomes a generic [`Object`] tagged with the type name
//!
//! Containers are allocated and memoized before their children are
//! reified, so shared atoms come back as one shared value and cycles come
//! back as cycles.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::relationalizers::mapping::KV_RELATION;
use crate::relationalizers::sequence::IDX_RELATION;
use crate::relationalizers::set::CONTAINS_RELATION;
use crate::relationalizers::tuple::TupleRelationalizer;
use crate::types::{shared, type_names, Atom, DataInstance, Object, Value, MIN_ARITY};

/// Error type for reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReifyError {
    /// The exchange data does not have the required shape.
    #[error("Malformed exchange data: {0}")]
    MalformedExchangeData(String),

    /// A relation tuple names an atom id that does not exist.
    #[error("Relation '{relation}' references unknown atom '{atom_id}'")]
    DanglingReference {
        /// Relation name.
        relation: String,
        /// Missing atom id.
        atom_id: String,
    },

    /// A reconstructor asked for an atom id that does not exist.
    #[error("Unknown atom '{0}'")]
    UnknownAtom(String),

    /// A custom reconstructor was re-entered for an atom it is still building.
    #[error("Unresolved cycle through custom reconstructor at atom '{0}'")]
    UnresolvedCycle(String),

    /// An atom could not be turned into a value.
    #[error("Cannot reconstruct atom '{atom_id}': {reason}")]
    Reconstruction {
        /// Atom id.
        atom_id: String,
        /// What went wrong.
        reason: String,
    },
}

fn malformed(reason: impl Into<String>) -> ReifyError {
    ReifyError::MalformedExchangeData(reason.into())
}

fn reconstruction(atom: &Atom, reason: impl Into<String>) -> ReifyError {
    ReifyError::Reconstruction {
        atom_id: atom.id.clone(),
        reason: reason.into(),
    }
}

/// Map entry identity during reconstruction.
#[derive(Debug, PartialEq, Eq, Hash)]
enum EntryKey<'a> {
    Scalar(String, String),
    Atom(&'a str),
}

/// Outgoing relations of one atom, grouped by name in first-seen order.
///
/// Each entry holds the tuples' atoms after the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomRelations {
    entries: Vec<(String, Vec<Vec<String>>)>,
}

static NO_RELATIONS: AtomRelations = AtomRelations {
    entries: Vec::new(),
};

impl AtomRelations {
    fn push(&mut self, name: &str, targets: Vec<String>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, tuples)) => tuples.push(targets),
            None => self.entries.push((name.to_string(), vec![targets])),
        }
    }

    /// Target tuples of relation `name` (empty if absent).
    pub fn get(&self, name: &str) -> &[Vec<String>] {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, tuples)| tuples.as_slice())
            .unwrap_or(&[])
    }

    /// First target of the first tuple of relation `name`.
    pub fn first_target(&self, name: &str) -> Option<&str> {
        self.get(name)
            .first()
            .and_then(|targets| targets.first())
            .map(String::as_str)
    }

    /// Relation names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, tuples)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<String>])> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t.as_slice()))
    }

    /// Number of distinct relation names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the atom has no outgoing relations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Deserialize)]
struct RawTuple {
    atoms: Vec<String>,
}

#[derive(Deserialize)]
struct RawRelationRecord {
    name: String,
    tuples: Vec<RawTuple>,
}

/// Validated, indexed atom/relation graph.
#[derive(Debug, Clone)]
pub struct AtomGraph {
    atoms: Vec<Atom>,
    index: HashMap<String, usize>,
    outgoing: HashMap<String, AtomRelations>,
    targets: HashSet<String>,
}

impl AtomGraph {
    /// Validate and index exchange data in its JSON form.
    pub fn from_json(data: &serde_json::Value) -> Result<Self, ReifyError> {
        let object = data
            .as_object()
            .ok_or_else(|| malformed("data instance must be an object"))?;
        let (Some(atoms), Some(relations)) = (object.get("atoms"), object.get("relations")) else {
            return Err(malformed("data instance must contain keys 'atoms' and 'relations'"));
        };

        let atoms: Vec<Atom> = serde_json::from_value(atoms.clone())
            .map_err(|e| malformed(format!("invalid atoms: {}", e)))?;
        let relations: Vec<RawRelationRecord> = serde_json::from_value(relations.clone())
            .map_err(|e| malformed(format!("invalid relations: {}", e)))?;

        Self::assemble(
            atoms,
            relations
                .into_iter()
                .map(|r| (r.name, r.tuples.into_iter().map(|t| t.atoms).collect())),
        )
    }

    /// Validate and index a typed instance.
    pub fn from_instance(instance: &DataInstance) -> Result<Self, ReifyError> {
        Self::assemble(
            instance.atoms.clone(),
            instance.relations.iter().map(|r| {
                (
                    r.name.clone(),
                    r.tuples.iter().map(|t| t.atoms.clone()).collect(),
                )
            }),
        )
    }

    fn assemble(
        atoms: Vec<Atom>,
        relations: impl IntoIterator<Item = (String, Vec<Vec<String>>)>,
    ) -> Result<Self, ReifyError> {
        if atoms.is_empty() {
            return Err(malformed("data instance must contain at least one atom"));
        }

        let mut index = HashMap::with_capacity(atoms.len());
        for (i, atom) in atoms.iter().enumerate() {
            index.entry(atom.id.clone()).or_insert(i);
        }

        let mut outgoing: HashMap<String, AtomRelations> = HashMap::new();
        let mut targets = HashSet::new();
        for (name, tuples) in relations {
            for tuple in tuples {
                if tuple.len() < MIN_ARITY {
                    return Err(malformed(format!(
                        "relation '{}' has a tuple of {} atoms, need at least {}",
                        name,
                        tuple.len(),
                        MIN_ARITY
                    )));
                }
                if let Some(missing) = tuple.iter().find(|id| !index.contains_key(id.as_str())) {
                    return Err(ReifyError::DanglingReference {
                        relation: name.clone(),
                        atom_id: missing.clone(),
                    });
                }
                targets.extend(tuple[1..].iter().cloned());
                outgoing
                    .entry(tuple[0].clone())
                    .or_default()
                    .push(&name, tuple[1..].to_vec());
            }
        }

        Ok(Self {
            atoms,
            index,
            outgoing,
            targets,
        })
    }

    /// Get an atom by id.
    pub fn atom(&self, id: &str) -> Option<&Atom> {
        self.index.get(id).map(|&i| &self.atoms[i])
    }

    /// Outgoing relations of an atom.
    pub fn relations(&self, id: &str) -> &AtomRelations {
        self.outgoing.get(id).unwrap_or(&NO_RELATIONS)
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Always false once validated.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The root atom.
    ///
    /// The root is the last atom, in atom order, that is the source of some
    /// relation and the target of none. The builder emits the root value's
    /// atom after all of its descendants, so for built output this is the
    /// value `build` was called on. When no atom qualifies (a lone scalar,
    /// an empty container, a root that sits on a cycle) the last atom is
    /// used. Data from several builds merged into one instance has several
    /// candidates; the last one wins and the choice is logged.
    pub fn root(&self) -> &Atom {
        let mut candidates = self
            .atoms
            .iter()
            .rev()
            .filter(|a| self.outgoing.contains_key(&a.id) && !self.targets.contains(&a.id));

        let Some(root) = candidates.next() else {
            return &self.atoms[self.atoms.len() - 1];
        };
        let others = candidates.count();
        if others > 0 {
            debug!(root = %root.id, others, "Several root candidates, using the last");
        }
        root
    }
}

/// Caller-supplied reconstruction for one declared type.
pub trait Reconstructor: Send + Sync {
    /// Build the value for `atom`. Children are reified through `ctx`.
    fn reconstruct(
        &self,
        atom: &Atom,
        relations: &AtomRelations,
        ctx: &mut ReifyContext<'_>,
    ) -> Result<Value, ReifyError>;
}

impl<F> Reconstructor for F
where
    F: Fn(&Atom, &AtomRelations, &mut ReifyContext<'_>) -> Result<Value, ReifyError> + Send + Sync,
{
    fn reconstruct(
        &self,
        atom: &Atom,
        relations: &AtomRelations,
        ctx: &mut ReifyContext<'_>,
    ) -> Result<Value, ReifyError> {
        self(atom, relations, ctx)
    }
}

/// Table of custom reconstructors keyed by declared type name.
///
/// Separate from the forward-pass handler registry. A reconstructor
/// registered for a built-in type name replaces the built-in behavior.
#[derive(Default)]
pub struct ReconstructorRegistry {
    reconstructors: RwLock<HashMap<String, Arc<dyn Reconstructor>>>,
}

impl ReconstructorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reconstructor, replacing any previous one for the type.
    pub fn register(&self, type_name: impl Into<String>, reconstructor: Arc<dyn Reconstructor>) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "Registered reconstructor");
        self.reconstructors.write().insert(type_name, reconstructor);
    }

    /// Register a closure.
    pub fn register_fn<F>(&self, type_name: impl Into<String>, f: F)
    where
        F: Fn(&Atom, &AtomRelations, &mut ReifyContext<'_>) -> Result<Value, ReifyError>
            + Send
            + Sync
            + 'static,
    {
        self.register(type_name, Arc::new(f));
    }

    /// Remove the reconstructor for a type. Returns whether one was present.
    pub fn unregister(&self, type_name: &str) -> bool {
        self.reconstructors.write().remove(type_name).is_some()
    }

    /// Registered type names.
    pub fn list_registered(&self) -> BTreeSet<String> {
        self.reconstructors.read().keys().cloned().collect()
    }

    /// Get the reconstructor for a type.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Reconstructor>> {
        self.reconstructors.read().get(type_name).cloned()
    }

    fn snapshot(&self) -> HashMap<String, Arc<dyn Reconstructor>> {
        self.reconstructors.read().clone()
    }
}

impl std::fmt::Debug for ReconstructorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructorRegistry")
            .field("registered", &self.list_registered())
            .finish()
    }
}

/// State of one reify call, handed to custom reconstructors.
pub struct ReifyContext<'a> {
    graph: &'a AtomGraph,
    reconstructors: HashMap<String, Arc<dyn Reconstructor>>,
    memo: HashMap<String, Value>,
    in_progress: HashSet<String>,
}

impl<'a> ReifyContext<'a> {
    fn new(graph: &'a AtomGraph, reconstructors: HashMap<String, Arc<dyn Reconstructor>>) -> Self {
        Self {
            graph,
            reconstructors,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Get an atom by id.
    pub fn atom(&self, id: &str) -> Option<&'a Atom> {
        self.graph.atom(id)
    }

    /// Outgoing relations of an atom.
    pub fn relations(&self, id: &str) -> &'a AtomRelations {
        self.graph.relations(id)
    }

    /// Reconstruct the value of an atom, memoized by id.
    pub fn reify_atom(&mut self, atom_id: &str) -> Result<Value, ReifyError> {
        if let Some(value) = self.memo.get(atom_id) {
            trace!(atom_id, "Atom already reified");
            return Ok(value.clone());
        }

        let graph = self.graph;
        let atom = graph
            .atom(atom_id)
            .ok_or_else(|| ReifyError::UnknownAtom(atom_id.to_string()))?;
        let relations = graph.relations(atom_id);

        if let Some(custom) = self.reconstructors.get(&atom.atom_type).cloned() {
            if !self.in_progress.insert(atom_id.to_string()) {
                return Err(ReifyError::UnresolvedCycle(atom_id.to_string()));
            }
            let result = custom.reconstruct(atom, relations, self);
            self.in_progress.remove(atom_id);
            let value = result?;
            self.memo.insert(atom_id.to_string(), value.clone());
            return Ok(value);
        }

        let value = match atom.atom_type.as_str() {
            type_names::NULL
            | type_names::BOOL
            | type_names::INT
            | type_names::FLOAT
            | type_names::STR => Value::parse_primitive(&atom.atom_type, &atom.label).ok_or_else(|| {
                reconstruction(atom, format!("cannot parse {:?} as {}", atom.label, atom.atom_type))
            })?,
            type_names::LIST => self.reify_list(atom, relations)?,
            type_names::TUPLE => self.reify_tuple(atom, relations)?,
            type_names::SET => self.reify_set(atom, relations)?,
            type_names::MAP => self.reify_map(atom, relations)?,
            type_names::FUNCTION => Value::function(&atom.label),
            _ => self.reify_generic(atom, relations)?,
        };
        self.memo.insert(atom_id.to_string(), value.clone());
        Ok(value)
    }

    fn remember(&mut self, atom: &Atom, value: &Value) {
        self.memo.insert(atom.id.clone(), value.clone());
    }

    /// Element ids ordered by position.
    ///
    /// Positions come from `positional` tuples (`[position atom, element]`)
    /// and from relations whose name parses as a position.
    fn ordered_elements(
        &mut self,
        atom: &Atom,
        relations: &AtomRelations,
        positional: &str,
        position_of: fn(&str) -> Option<usize>,
    ) -> Result<Vec<String>, ReifyError> {
        let mut positioned: Vec<(i64, String)> = Vec::new();
        for targets in relations.get(positional) {
            let [position_id, element_id, ..] = targets.as_slice() else {
                return Err(reconstruction(
                    atom,
                    format!("'{}' tuple needs a position and an element", positional),
                ));
            };
            let position = self.reify_atom(position_id)?.as_int().ok_or_else(|| {
                reconstruction(atom, format!("position atom '{}' is not an int", position_id))
            })?;
            positioned.push((position, element_id.clone()));
        }
        for (name, tuples) in relations.iter() {
            let Some(position) = position_of(name).or_else(|| name.parse().ok()) else {
                continue;
            };
            for targets in tuples {
                if let Some(element_id) = targets.last() {
                    positioned.push((position as i64, element_id.clone()));
                }
            }
        }
        positioned.sort_by_key(|(position, _)| *position);
        Ok(positioned.into_iter().map(|(_, id)| id).collect())
    }

    fn reify_all(&mut self, ids: &[String]) -> Result<Vec<Value>, ReifyError> {
        ids.iter().map(|id| self.reify_atom(id)).collect()
    }

    fn reify_list(&mut self, atom: &Atom, relations: &AtomRelations) -> Result<Value, ReifyError> {
        let handle = shared(Vec::new());
        let value = Value::List(handle.clone());
        self.remember(atom, &value);

        let ids = self.ordered_elements(atom, relations, IDX_RELATION, |_| None)?;
        let items = self.reify_all(&ids)?;
        *handle.write() = items;
        Ok(value)
    }

    fn reify_tuple(&mut self, atom: &Atom, relations: &AtomRelations) -> Result<Value, ReifyError> {
        let handle = shared(Vec::new());
        let value = Value::Tuple(handle.clone());
        self.remember(atom, &value);

        let ids = self.ordered_elements(atom, relations, IDX_RELATION, TupleRelationalizer::parse_position)?;
        let items = self.reify_all(&ids)?;
        *handle.write() = items;
        Ok(value)
    }

    fn reify_set(&mut self, atom: &Atom, relations: &AtomRelations) -> Result<Value, ReifyError> {
        let handle = shared(Vec::new());
        let value = Value::Set(handle.clone());
        self.remember(atom, &value);

        // Members are unique by atom id. Values are never compared deeply
        // here; they may be cyclic.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut items = Vec::new();
        for targets in relations.get(CONTAINS_RELATION) {
            if let Some(element_id) = targets.last() {
                if seen.insert(element_id.as_str()) {
                    items.push(self.reify_atom(element_id)?);
                }
            }
        }
        *handle.write() = items;
        Ok(value)
    }

    fn reify_map(&mut self, atom: &Atom, relations: &AtomRelations) -> Result<Value, ReifyError> {
        let handle = shared(Vec::new());
        let value = Value::Map(handle.clone());
        self.remember(atom, &value);

        // Scalar keys compare by value, container keys by atom id. Values are
        // never compared deeply here; they may be cyclic.
        let mut slots: HashMap<EntryKey<'_>, usize> = HashMap::new();
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for (name, tuples) in relations.iter() {
            for targets in tuples {
                let (slot_key, key, item) = if name == KV_RELATION {
                    let [key_id, item_id, ..] = targets.as_slice() else {
                        return Err(reconstruction(atom, "'kv' tuple needs a key and a value"));
                    };
                    let key = self.reify_atom(key_id)?;
                    let slot_key = match key.primitive_text() {
                        Some(text) => EntryKey::Scalar(key.type_name(), text),
                        None => EntryKey::Atom(key_id),
                    };
                    (slot_key, key, self.reify_atom(item_id)?)
                } else {
                    let item_id = &targets[targets.len() - 1];
                    let slot_key = EntryKey::Scalar(type_names::STR.to_string(), name.to_string());
                    (slot_key, Value::from(name), self.reify_atom(item_id)?)
                };
                match slots.get(&slot_key) {
                    Some(&i) => entries[i].1 = item,
                    None => {
                        slots.insert(slot_key, entries.len());
                        entries.push((key, item));
                    }
                }
            }
        }
        *handle.write() = entries;
        Ok(value)
    }

    fn reify_generic(&mut self, atom: &Atom, relations: &AtomRelations) -> Result<Value, ReifyError> {
        debug!(atom_id = %atom.id, atom_type = %atom.atom_type, "No reconstructor for type, using generic object");

        let bases: Vec<String> = atom
            .hierarchy()
            .into_iter()
            .skip(1)
            .filter(|t| t != type_names::OBJECT)
            .collect();
        let handle = shared(Object::new(&atom.atom_type).with_bases(bases));
        let value = Value::Object(handle.clone());
        self.remember(atom, &value);

        let mut attrs = Vec::with_capacity(relations.len());
        for (name, tuples) in relations.iter() {
            let mut values = Vec::with_capacity(tuples.len());
            for targets in tuples {
                values.push(match targets.as_slice() {
                    [single] => self.reify_atom(single)?,
                    many => Value::tuple(self.reify_all(many)?),
                });
            }
            let field = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::list(values)
            };
            attrs.push((name.to_string(), field));
        }
        handle.write().attrs = attrs;
        Ok(value)
    }
}

/// Reconstruct the root value of a validated graph.
pub fn reify_graph(graph: &AtomGraph, reconstructors: &ReconstructorRegistry) -> Result<Value, ReifyError> {
    let root = graph.root();
    let mut ctx = ReifyContext::new(graph, reconstructors.snapshot());
    let value = ctx.reify_atom(&root.id)?;
    debug!(
        root = %root.id,
        atoms = graph.len(),
        reified = ctx.memo.len(),
        "Reified data instance"
    );
    Ok(value)
}

/// Reconstruct a value from exchange data in JSON form.
pub fn reify(data: &serde_json::Value, reconstructors: &ReconstructorRegistry) -> Result<Value, ReifyError> {
    let graph = AtomGraph::from_json(data)?;
    reify_graph(&graph, reconstructors)
}

/// Reconstruct a value from a typed instance.
pub fn reify_instance(
    instance: &DataInstance,
    reconstructors: &ReconstructorRegistry,
) -> Result<Value, ReifyError> {
    let graph = AtomGraph::from_instance(instance)?;
    reify_graph(&graph, reconstructors)
}

/// Whether `data` passes the reconstruction preconditions.
pub fn can_reify(data: &serde_json::Value) -> bool {
    AtomGraph::from_json(data).is_ok()
}
