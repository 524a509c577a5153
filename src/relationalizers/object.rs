//! Generic objects: one binary relation per data attribute.

use super::{is_private, DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Relation, Value};

/// Handles `Object` by introspecting its attributes.
///
/// Callables are not data and are skipped, as are private attributes when
/// the build policy says so.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectRelationalizer;

impl Relationalizer for ObjectRelationalizer {
    fn name(&self) -> &str {
        "object"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Object(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let object = match value {
            Value::Object(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected object, got {}", other.type_name()))),
        };

        let object_id = walker.current_id();
        let skip_private = walker.policy().skip_private_fields;
        let atom = Atom::new(&object_id, &object.class, &object.class);

        let mut relations = Vec::new();
        for (name, attr) in &object.attrs {
            if (skip_private && is_private(name)) || matches!(attr, Value::Function(_)) {
                continue;
            }
            let target = walker.walk(attr)?;
            relations.push(Relation::binary(name, &object_id, target));
        }

        Ok(Decomposition::new(vec![atom], relations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;
    use crate::types::Object;

    #[test]
    fn test_skips_methods_and_private() {
        let person = Value::object(
            Object::new("Person")
                .with_attr("name", "Ada")
                .with_attr("_secret", 7)
                .with_attr("greet", Value::function("greet"))
                .with_attr("age", 36),
        );
        let mut walker = RecordingWalker::new("o");
        let d = ObjectRelationalizer.relationalize(&person, &mut walker).unwrap();

        let names: Vec<&str> = d.relations.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["name", "age"]);
        assert_eq!(d.atoms[0].label, "Person");
        assert_eq!(walker.walked.len(), 2);
    }
}
