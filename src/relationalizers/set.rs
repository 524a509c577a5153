//! Sets: container atom, binary `contains` relations.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Relation, Value};

/// Relation name for set membership.
pub const CONTAINS_RELATION: &str = "contains";

/// Handles `Set` as `contains(set, element)` per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetRelationalizer;

impl Relationalizer for SetRelationalizer {
    fn name(&self) -> &str {
        "set"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Set(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let items = match value {
            Value::Set(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected set, got {}", other.type_name()))),
        };

        let set_id = walker.current_id();
        let atom = Atom::new(&set_id, value.type_name(), format!("Set{{{}}}", items.len()));
        let mut relations = Vec::with_capacity(items.len());
        for item in &items {
            let item_id = walker.walk(item)?;
            relations.push(Relation::binary(CONTAINS_RELATION, &set_id, item_id));
        }

        Ok(Decomposition::new(vec![atom], relations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;

    #[test]
    fn test_membership() {
        let set = Value::set(vec![Value::from("x"), Value::from("y")]);
        let mut walker = RecordingWalker::new("z");
        let d = SetRelationalizer.relationalize(&set, &mut walker).unwrap();

        assert_eq!(d.atoms[0].label, "Set{2}");
        assert_eq!(d.relations.len(), 2);
        assert!(d.relations.iter().all(|r| r.name() == CONTAINS_RELATION && r.source() == "z"));
    }
}
