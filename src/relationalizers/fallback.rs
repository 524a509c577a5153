//! Fallback: accepts anything, emits a single atom.

use super::{DecomposeError, Decomposition, Relationalizer, Walker};
use crate::canonical::short_hash;
use crate::types::{Atom, Value};

/// Last-resort handler. Never fails and never emits relations.
///
/// The label is the value's own name tag when it has one (callable name,
/// opaque name), otherwise the type name plus a short hash of the atom id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRelationalizer;

impl FallbackRelationalizer {
    /// Best-effort human-readable tag.
    pub fn label_for(value: &Value, atom_id: &str) -> String {
        let tag = match value {
            Value::Function(f) => Some(f.name.clone()),
            Value::Opaque(o) => o.name.clone(),
            _ => None,
        };
        tag.unwrap_or_else(|| format!("{}#{}", value.type_name(), short_hash(atom_id)))
    }
}

impl Relationalizer for FallbackRelationalizer {
    fn name(&self) -> &str {
        "fallback"
    }

    fn can_handle(&self, _value: &Value) -> bool {
        true
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let id = walker.current_id();
        let label = Self::label_for(value, &id);
        Ok(Decomposition::single(Atom::new(id, value.type_name(), label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;
    use crate::types::Opaque;

    #[test]
    fn test_named_tags() {
        let mut walker = RecordingWalker::new("f");
        let d = FallbackRelationalizer
            .relationalize(&Value::function("handler"), &mut walker)
            .unwrap();
        assert_eq!(d.atoms[0].label, "handler");
        assert_eq!(d.atoms[0].atom_type, "function");
        assert!(d.relations.is_empty());

        let conn = Value::opaque(Opaque::new("Socket").with_name("conn"));
        let d = FallbackRelationalizer.relationalize(&conn, &mut walker).unwrap();
        assert_eq!(d.atoms[0].label, "conn");
    }

    #[test]
    fn test_hash_label_is_stable() {
        let anon = Value::opaque(Opaque::new("Socket"));
        let label = FallbackRelationalizer::label_for(&anon, "n3");
        assert!(label.starts_with("Socket#"));
        assert_eq!(label, FallbackRelationalizer::label_for(&anon, "n3"));
    }
}
