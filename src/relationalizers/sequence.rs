//! Sequences: container atom, index atoms, ternary `idx` relations.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{type_names, Atom, Relation, Value};

/// Relation name for sequence positions.
pub const IDX_RELATION: &str = "idx";

/// Handles `List` as `idx(list, index, element)` per position.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRelationalizer;

impl SequenceRelationalizer {
    /// Id of the auxiliary index atom for `position`.
    pub fn index_atom_id(list_id: &str, position: usize) -> String {
        format!("{}_idx_{}", list_id, position)
    }
}

impl Relationalizer for SequenceRelationalizer {
    fn name(&self) -> &str {
        "sequence"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let items = match value {
            Value::List(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected list, got {}", other.type_name()))),
        };

        let list_id = walker.current_id();
        let mut atoms = vec![Atom::new(&list_id, value.type_name(), format!("Seq[{}]", items.len()))];
        let mut relations = Vec::with_capacity(items.len());

        for (position, item) in items.iter().enumerate() {
            let index_id = Self::index_atom_id(&list_id, position);
            atoms.push(Atom::new(&index_id, type_names::INT, position.to_string()));
            let item_id = walker.walk(item)?;
            relations.push(Relation::ternary(IDX_RELATION, &list_id, index_id, item_id));
        }

        Ok(Decomposition::new(atoms, relations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;

    #[test]
    fn test_index_atoms_distinguish_repeats() {
        let list = Value::list(vec![Value::from(1), Value::from(1)]);
        let mut walker = RecordingWalker::new("s");
        let d = SequenceRelationalizer.relationalize(&list, &mut walker).unwrap();

        assert_eq!(d.atoms[0].label, "Seq[2]");
        assert_eq!(d.atoms.len(), 3);
        assert_eq!(d.relations[0].atoms(), ["s", "s_idx_0", "int:1"]);
        assert_eq!(d.relations[1].atoms(), ["s", "s_idx_1", "int:1"]);
    }
}
