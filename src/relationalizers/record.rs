//! Structured records: one binary relation per declared field.

use super::{is_private, DecomposeError, Decomposition, Relationalizer, Walker};
use crate::types::{Atom, Relation, Value};

/// Handles `Record`, labelled with the record's type name.
///
/// Fields come from the declared schema. Private (`_`-prefixed) fields are
/// skipped when the build policy says so. A record whose value count does
/// not match its schema is malformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordRelationalizer;

impl Relationalizer for RecordRelationalizer {
    fn name(&self) -> &str {
        "record"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Record(_))
    }

    fn relationalize(
        &self,
        value: &Value,
        walker: &mut dyn Walker,
    ) -> Result<Decomposition, DecomposeError> {
        let record = match value {
            Value::Record(h) => h.read_recursive().clone(),
            other => return Err(DecomposeError::Malformed(format!("expected record, got {}", other.type_name()))),
        };
        if record.values.len() != record.schema.fields.len() {
            return Err(DecomposeError::Malformed(format!(
                "record {} declares {} fields but holds {} values",
                record.schema.name,
                record.schema.fields.len(),
                record.values.len()
            )));
        }

        let record_id = walker.current_id();
        let skip_private = walker.policy().skip_private_fields;
        let atom = Atom::new(&record_id, &record.schema.name, &record.schema.name);

        let mut relations = Vec::new();
        for (field, field_value) in record.schema.fields.iter().zip(&record.values) {
            if skip_private && is_private(field) {
                continue;
            }
            let target = walker.walk(field_value)?;
            relations.push(Relation::binary(field, &record_id, target));
        }

        Ok(Decomposition::new(vec![atom], relations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationalizers::testing::RecordingWalker;
    use crate::types::RecordSchema;
    use std::sync::Arc;

    fn point_schema() -> Arc<RecordSchema> {
        Arc::new(RecordSchema::new("Point", ["x", "y", "_cache"]))
    }

    #[test]
    fn test_fields_become_relations() {
        let point = Value::record(point_schema(), vec![Value::from(1), Value::from(2), Value::Null]);
        let mut walker = RecordingWalker::new("r");
        let d = RecordRelationalizer.relationalize(&point, &mut walker).unwrap();

        assert_eq!(d.atoms[0].label, "Point");
        assert_eq!(d.atoms[0].atom_type, "Point");
        let names: Vec<&str> = d.relations.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_private_fields_kept_when_policy_allows() {
        let point = Value::record(point_schema(), vec![Value::from(1), Value::from(2), Value::Null]);
        let mut walker = RecordingWalker::new("r");
        walker.policy.skip_private_fields = false;
        let d = RecordRelationalizer.relationalize(&point, &mut walker).unwrap();
        assert_eq!(d.relations.len(), 3);
    }

    #[test]
    fn test_value_count_mismatch_is_malformed() {
        let broken = Value::record(point_schema(), vec![Value::from(1)]);
        let mut walker = RecordingWalker::new("r");
        assert!(matches!(
            RecordRelationalizer.relationalize(&broken, &mut walker),
            Err(DecomposeError::Malformed(_))
        ));
    }
}
