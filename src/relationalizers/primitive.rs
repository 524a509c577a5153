//! Scalars: one atom, no relations.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Value};

/// Handles `Null`, `Bool`, `Int`, `Float` and `Str`.
///
/// The atom id is value-derived (assigned by the walker), so equal scalars
/// collapse onto one atom across the whole graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveRelationalizer;

impl Relationalizer for PrimitiveRelationalizer {
    fn name(&self) -> &str {
        "primitive"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.is_primitive()
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let label = value
            .primitive_text()
            .ok_or_else(|| DecomposeError::Malformed(format!("{} is not a scalar", value.type_name())))?;
        Ok(Decomposition::single(Atom::new(walker.current_id(), value.type_name(), label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;

    #[test]
    fn test_labels() {
        let mut walker = RecordingWalker::new("p");
        for (value, label) in [
            (Value::Null, "null"),
            (Value::Bool(false), "false"),
            (Value::Int(42), "42"),
            (Value::Float(0.5), "0.5"),
            (Value::from("hi"), "hi"),
        ] {
            let d = PrimitiveRelationalizer.relationalize(&value, &mut walker).unwrap();
            assert_eq!(d.atoms.len(), 1);
            assert_eq!(d.atoms[0].label, label);
            assert!(d.relations.is_empty());
        }
    }

    #[test]
    fn test_rejects_containers() {
        assert!(!PrimitiveRelationalizer.can_handle(&Value::list(Vec::new())));
    }
}
