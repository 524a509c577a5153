//! Annotation collaborator boundary.
//!
//! Styling and layout directives live outside the kernel. The builder asks
//! an [`AnnotationSource`] once per visited identity and merges the answers
//! into one accumulator. Annotations never change the atom/relation graph.

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Constraints and directives collected during one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Layout constraints.
    pub constraints: Vec<serde_json::Value>,
    /// Styling directives.
    pub directives: Vec<serde_json::Value>,
}

impl Annotations {
    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.directives.is_empty()
    }

    /// Merge `other` in, skipping entries already present.
    ///
    /// First occurrence order is preserved, so many instances of one
    /// annotated type contribute each rule once.
    pub fn merge(&mut self, other: Annotations) {
        for constraint in other.constraints {
            if !self.constraints.contains(&constraint) {
                self.constraints.push(constraint);
            }
        }
        for directive in other.directives {
            if !self.directives.contains(&directive) {
                self.directives.push(directive);
            }
        }
    }
}

/// Source of per-value annotations.
pub trait AnnotationSource: Send + Sync {
    /// Annotations that apply to `value`.
    fn collect_for(&self, value: &Value) -> Annotations;
}

impl<F> AnnotationSource for F
where
    F: Fn(&Value) -> Annotations + Send + Sync,
{
    fn collect_for(&self, value: &Value) -> Annotations {
        self(value)
    }
}

/// Source that never annotates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotations;

impl AnnotationSource for NoAnnotations {
    fn collect_for(&self, _value: &Value) -> Annotations {
        Annotations::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_dedups_in_order() {
        let mut acc = Annotations::default();
        acc.merge(Annotations {
            constraints: vec![json!({"orientation": {"selector": "children"}})],
            directives: vec![json!({"atomColor": {"value": "red"}})],
        });
        acc.merge(Annotations {
            constraints: vec![
                json!({"group": {"field": "items"}}),
                json!({"orientation": {"selector": "children"}}),
            ],
            directives: vec![json!({"atomColor": {"value": "red"}})],
        });

        assert_eq!(acc.constraints.len(), 2);
        assert!(acc.constraints[0].get("orientation").is_some());
        assert_eq!(acc.directives.len(), 1);
    }

    #[test]
    fn test_closure_source() {
        let source = |value: &Value| {
            let mut a = Annotations::default();
            if value.type_name() == "list" {
                a.directives.push(json!({"flag": "list"}));
            }
            a
        };
        assert!(source.collect_for(&Value::from(1)).is_empty());
        assert!(!source.collect_for(&Value::list(Vec::new())).is_empty());
        assert!(NoAnnotations.collect_for(&Value::Null).is_empty());
    }
}
