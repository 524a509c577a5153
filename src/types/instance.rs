//! Exchange format handed to rendering layers.
//!
//! A [`DataInstance`] is the JSON-equivalent record consumed verbatim by the
//! display collaborator:
//!
//! ```text
//! { atoms:     [{id, type, label, type_hierarchy?}],
//!   relations: [{id, name, types, tuples: [{atoms, types}]}],
//!   types:     [{id, types, atoms: [{id, type}], meta: {builtin}}] }
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::atom::Atom;
use super::relation::Relation;
use super::value::type_names;
use crate::canonical::canonical_hash_hex;

/// One tuple of a grouped relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTuple {
    /// Participating atom ids, source first.
    pub atoms: Vec<String>,
    /// Declared type of each participating atom, parallel to `atoms`.
    pub types: Vec<String>,
}

/// All tuples sharing one relation name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Relation id (same as its name).
    pub id: String,
    /// Relation name.
    pub name: String,
    /// Per-position signature types.
    pub types: Vec<String>,
    /// Tuples in build order.
    pub tuples: Vec<RelationTuple>,
}

/// Reference from a type entry to one of its atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomRef {
    /// Atom id.
    pub id: String,
    /// Atom type.
    #[serde(rename = "type")]
    pub atom_type: String,
}

/// Type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    /// Whether this is a built-in type.
    pub builtin: bool,
}

/// Directory entry grouping atoms by most specific type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    /// Most specific type name.
    pub id: String,
    /// Type hierarchy, most specific first.
    pub types: Vec<String>,
    /// Atoms of this type.
    pub atoms: Vec<AtomRef>,
    /// Metadata.
    pub meta: TypeMeta,
}

/// Complete atom/relation graph for one built value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataInstance {
    /// Deduplicated atoms.
    pub atoms: Vec<Atom>,
    /// Relations grouped by name.
    pub relations: Vec<RelationRecord>,
    /// Type directory.
    pub types: Vec<TypeEntry>,
}

impl DataInstance {
    /// Assemble an instance from raw accumulated atoms and relations.
    ///
    /// Atoms are deduplicated by id (first occurrence wins), relations are
    /// grouped by name in first-seen order, and the type directory is built
    /// from the deduplicated atoms.
    pub fn assemble(atoms: Vec<Atom>, relations: Vec<Relation>) -> Self {
        let atoms = dedup_atoms(atoms);
        let relations = group_relations(&atoms, relations);
        let types = build_types(&atoms);
        Self {
            atoms,
            relations,
            types,
        }
    }

    /// Get an atom by id.
    pub fn atom(&self, id: &str) -> Option<&Atom> {
        self.atoms.iter().find(|a| a.id == id)
    }

    /// Get a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationRecord> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Get a type directory entry by type name.
    pub fn type_entry(&self, type_id: &str) -> Option<&TypeEntry> {
        self.types.iter().find(|t| t.id == type_id)
    }

    /// Atoms of a given declared type.
    pub fn atoms_of_type<'a>(&'a self, atom_type: &'a str) -> impl Iterator<Item = &'a Atom> + 'a {
        self.atoms.iter().filter(move |a| a.atom_type == atom_type)
    }

    /// Number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Number of relation tuples across all names.
    pub fn num_tuples(&self) -> usize {
        self.relations.iter().map(|r| r.tuples.len()).sum()
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Deserialize from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Deterministic fingerprint of the whole instance.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        canonical_hash_hex(self)
    }
}

fn dedup_atoms(atoms: Vec<Atom>) -> Vec<Atom> {
    let mut seen: HashSet<String> = HashSet::with_capacity(atoms.len());
    atoms
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

fn group_relations(atoms: &[Atom], relations: Vec<Relation>) -> Vec<RelationRecord> {
    let type_of: HashMap<&str, &str> = atoms
        .iter()
        .map(|a| (a.id.as_str(), a.atom_type.as_str()))
        .collect();

    let mut records: Vec<RelationRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for relation in relations {
        let types = relation
            .atoms()
            .iter()
            .map(|id| {
                type_of
                    .get(id.as_str())
                    .copied()
                    .unwrap_or(type_names::OBJECT)
                    .to_string()
            })
            .collect();
        let tuple = RelationTuple {
            atoms: relation.atoms().to_vec(),
            types,
        };

        let slot = match index.get(relation.name()) {
            Some(&i) => i,
            None => {
                records.push(RelationRecord {
                    id: relation.name().to_string(),
                    name: relation.name().to_string(),
                    types: vec![type_names::OBJECT.to_string(); relation.arity()],
                    tuples: Vec::new(),
                });
                index.insert(relation.name().to_string(), records.len() - 1);
                records.len() - 1
            }
        };
        records[slot].tuples.push(tuple);
    }

    records
}

fn build_types(atoms: &[Atom]) -> Vec<TypeEntry> {
    let mut entries: Vec<TypeEntry> = Vec::new();
    // Whether the entry's hierarchy came from a primary atom.
    let mut explicit: Vec<bool> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for atom in atoms {
        let slot = match index.get(atom.atom_type.as_str()) {
            Some(&i) => i,
            None => {
                entries.push(TypeEntry {
                    id: atom.atom_type.clone(),
                    types: atom.hierarchy(),
                    atoms: Vec::new(),
                    meta: TypeMeta {
                        builtin: type_names::is_builtin(&atom.atom_type),
                    },
                });
                explicit.push(atom.type_hierarchy.is_some());
                index.insert(atom.atom_type.as_str(), entries.len() - 1);
                entries.len() - 1
            }
        };
        // Auxiliary atoms may come first; the first primary atom wins.
        if !explicit[slot] {
            if let Some(hierarchy) = &atom.type_hierarchy {
                entries[slot].types = hierarchy.clone();
                explicit[slot] = true;
            }
        }
        entries[slot].atoms.push(AtomRef {
            id: atom.id.clone(),
            atom_type: atom.atom_type.clone(),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataInstance {
        let atoms = vec![
            Atom::new("int:aa", "int", "1"),
            Atom::new("n0_idx_0", "int", "0"),
            Atom::new("int:aa", "int", "1"),
            Atom::new("n0", "list", "Seq[1]").with_hierarchy(vec!["list".into(), "object".into()]),
        ];
        let relations = vec![Relation::ternary("idx", "n0", "n0_idx_0", "int:aa")];
        DataInstance::assemble(atoms, relations)
    }

    #[test]
    fn test_assemble_dedups_first_wins() {
        let instance = sample();
        assert_eq!(instance.num_atoms(), 3);
        assert_eq!(instance.atoms[0].id, "int:aa");
    }

    #[test]
    fn test_relations_carry_tuple_types() {
        let instance = sample();
        let idx = instance.relation("idx").unwrap();
        assert_eq!(idx.id, "idx");
        assert_eq!(idx.types, vec!["object"; 3]);
        assert_eq!(idx.tuples[0].types, vec!["list", "int", "int"]);
    }

    #[test]
    fn test_type_directory() {
        let instance = sample();
        let ints = instance.type_entry("int").unwrap();
        assert_eq!(ints.atoms.len(), 2);
        assert!(ints.meta.builtin);
        let lists = instance.type_entry("list").unwrap();
        assert_eq!(lists.types, vec!["list", "object"]);
    }

    #[test]
    fn test_type_directory_prefers_primary_atoms() {
        let atoms = vec![
            Atom::new("n0_idx_0", "int", "0"),
            Atom::new("n0", "list", "Seq[1]").with_hierarchy(vec!["list".into(), "object".into()]),
            Atom::new("int:7", "int", "7").with_hierarchy(vec!["int".into(), "object".into()]),
        ];
        let instance = DataInstance::assemble(atoms, Vec::new());
        assert_eq!(instance.type_entry("int").unwrap().types, vec!["int", "object"]);
        assert_eq!(instance.type_entry("int").unwrap().atoms.len(), 2);
    }

    #[test]
    fn test_type_directory_without_primary_atom() {
        let atoms = vec![Atom::new("n0_key_0", "str", "k")];
        let instance = DataInstance::assemble(atoms, Vec::new());
        assert_eq!(instance.type_entry("str").unwrap().types, vec!["str", "object"]);
    }

    #[test]
    fn test_json_shape_and_fingerprint() {
        let instance = sample();
        let json = instance.to_json().unwrap();
        assert!(json["atoms"].is_array());
        assert_eq!(json["types"][0]["meta"]["builtin"], true);
        assert_eq!(json["relations"][0]["tuples"][0]["atoms"][0], "n0");

        let back = DataInstance::from_json(json).unwrap();
        assert_eq!(back, instance);
        assert_eq!(back.fingerprint().unwrap(), instance.fingerprint().unwrap());
    }
}
