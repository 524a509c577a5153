//! Tuples: container atom, positional binary relations.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Relation, Value};

/// Prefix of positional tuple relation names (`t0`, `t1`, ...).
pub const TUPLE_RELATION_PREFIX: char = 't';

/// Handles `Tuple` as `t{i}(tuple, element)` per position.
///
/// Tuple positions are distinct fields, so each gets its own relation name
/// instead of sharing one index relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleRelationalizer;

impl TupleRelationalizer {
    /// Relation name for `position`.
    pub fn position_relation(position: usize) -> String {
        format!("{}{}", TUPLE_RELATION_PREFIX, position)
    }

    /// Parse a position back out of a relation name.
    pub fn parse_position(name: &str) -> Option<usize> {
        name.strip_prefix(TUPLE_RELATION_PREFIX)?.parse().ok()
    }
}

impl Relationalizer for TupleRelationalizer {
    fn name(&self) -> &str {
        "tuple"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Tuple(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let items = match value {
            Value::Tuple(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected tuple, got {}", other.type_name()))),
        };

        let tuple_id = walker.current_id();
        let atom = Atom::new(&tuple_id, value.type_name(), format!("Tuple[{}]", items.len()));
        let mut relations = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let item_id = walker.walk(item)?;
            relations.push(Relation::binary(Self::position_relation(position), &tuple_id, item_id));
        }

        Ok(Decomposition::new(vec![atom], relations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;

    #[test]
    fn test_positional_relations() {
        let tuple = Value::tuple(vec![Value::from("x"), Value::from(2.5)]);
        let mut walker = RecordingWalker::new("t");
        let d = TupleRelationalizer.relationalize(&tuple, &mut walker).unwrap();

        let names: Vec<&str> = d.relations.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["t0", "t1"]);
        assert!(d.relations.iter().all(|r| r.is_binary()));
        assert_eq!(d.atoms.len(), 1);
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(TupleRelationalizer::parse_position("t12"), Some(12));
        assert_eq!(TupleRelationalizer::parse_position("idx"), None);
    }
}
