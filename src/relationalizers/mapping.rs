//! Mappings: container atom, key atoms, ternary `kv` relations.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Relation, Value};

/// Relation name for mapping entries.
pub const KV_RELATION: &str = "kv";

/// Handles `Map`.
///
/// Each entry becomes `kv(map, key, value)`. A single ternary relation keeps
/// the exact key/value pairing even when one value sits under several keys.
/// Scalar keys get an auxiliary key atom per entry; other keys are walked
/// and referenced by their own atom.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingRelationalizer;

impl MappingRelationalizer {
    /// Id of the auxiliary key atom for entry `position`.
    pub fn key_atom_id(map_id: &str, position: usize) -> String {
        format!("{}_key_{}", map_id, position)
    }
}

impl Relationalizer for MappingRelationalizer {
    fn name(&self) -> &str {
        "mapping"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let entries = match value {
            Value::Map(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected map, got {}", other.type_name()))),
        };

        let map_id = walker.current_id();
        let mut atoms = vec![Atom::new(&map_id, value.type_name(), format!("Map{{{}}}", entries.len()))];
        let mut relations = Vec::with_capacity(entries.len());

        for (position, (key, item)) in entries.iter().enumerate() {
            let key_id = match key.primitive_text() {
                Some(text) => {
                    let id = Self::key_atom_id(&map_id, position);
                    atoms.push(Atom::new(&id, key.type_name(), text));
                    id
                }
                None => walker.walk(key)?,
            };
            let item_id = walker.walk(item)?;
            relations.push(Relation::ternary(KV_RELATION, &map_id, key_id, item_id));
        }

        Ok(Decomposition::new(atoms, relations))
    }
}
