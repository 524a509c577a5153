//! Atom type for the relational graph.

use serde::{Deserialize, Serialize};

use super::type_names;

/// One node of the relational graph.
///
/// The primary atom of a value carries the value's most specific type and
/// its full type hierarchy. Auxiliary atoms (index and key atoms) carry a
/// handler-chosen type and no hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    /// Unique id within one graph.
    pub id: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub atom_type: String,
    /// Display label.
    pub label: String,
    /// Ancestor types, most specific first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hierarchy: Option<Vec<String>>,
}

impl Atom {
    /// Create a new atom without hierarchy metadata.
    pub fn new(id: impl Into<String>, atom_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            atom_type: atom_type.into(),
            label: label.into(),
            type_hierarchy: None,
        }
    }

    /// Attach a type hierarchy.
    pub fn with_hierarchy(mut self, hierarchy: Vec<String>) -> Self {
        self.type_hierarchy = Some(hierarchy);
        self
    }

    /// Type hierarchy, defaulting to the declared type followed by `object`.
    pub fn hierarchy(&self) -> Vec<String> {
        if let Some(hierarchy) = &self.type_hierarchy {
            return hierarchy.clone();
        }
        let mut chain = vec![self.atom_type.clone()];
        if self.atom_type != type_names::OBJECT {
            chain.push(type_names::OBJECT.to_string());
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_serializes_type_field() {
        let atom = Atom::new("n0", "list", "Seq[2]");
        let json = serde_json::to_value(&atom).unwrap();
        assert_eq!(json["type"], "list");
        assert!(json.get("type_hierarchy").is_none());

        let with = atom.with_hierarchy(vec!["list".into(), "object".into()]);
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(json["type_hierarchy"][1], "object");
    }

    #[test]
    fn test_hierarchy_default() {
        let atom = Atom::new("n1", "int", "3");
        assert_eq!(atom.hierarchy(), vec!["int", "object"]);
        assert_eq!(Atom::new("n2", "object", "object").hierarchy(), vec!["object"]);
    }
}
