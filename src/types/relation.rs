//! Relation type for the relational graph.

use serde::{Deserialize, Serialize};

/// Minimum number of atoms a relation connects.
pub const MIN_ARITY: usize = 2;

/// Error constructing a relation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelationError {
    /// Fewer than two atoms supplied.
    #[error("Relation '{name}' must connect at least {MIN_ARITY} atoms, got {arity}")]
    InsufficientArity {
        /// Relation name.
        name: String,
        /// Number of atoms supplied.
        arity: usize,
    },
}

/// Named, ordered, n-ary connection between atoms.
///
/// The first atom is the relation's source for reconstruction purposes;
/// the remaining atoms are its targets. A binary relation is the arity-2 case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRelation")]
pub struct Relation {
    name: String,
    atoms: Vec<String>,
}

#[derive(Deserialize)]
struct RawRelation {
    name: String,
    atoms: Vec<String>,
}

impl TryFrom<RawRelation> for Relation {
    type Error = RelationError;

    fn try_from(raw: RawRelation) -> Result<Self, Self::Error> {
        Relation::new(raw.name, raw.atoms)
    }
}

impl Relation {
    /// Create an n-ary relation. Fails if fewer than two atoms are given.
    pub fn new(
        name: impl Into<String>,
        atoms: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, RelationError> {
        let name = name.into();
        let atoms: Vec<String> = atoms.into_iter().map(Into::into).collect();
        if atoms.len() < MIN_ARITY {
            return Err(RelationError::InsufficientArity {
                name,
                arity: atoms.len(),
            });
        }
        Ok(Self { name, atoms })
    }

    /// Create a binary relation.
    pub fn binary(name: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            atoms: vec![source.into(), target.into()],
        }
    }

    /// Create a ternary relation.
    pub fn ternary(
        name: impl Into<String>,
        source: impl Into<String>,
        middle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            atoms: vec![source.into(), middle.into(), target.into()],
        }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connected atom ids in order.
    pub fn atoms(&self) -> &[String] {
        &self.atoms
    }

    /// Number of connected atoms.
    pub fn arity(&self) -> usize {
        self.atoms.len()
    }

    /// Whether this relation connects exactly two atoms.
    pub fn is_binary(&self) -> bool {
        self.atoms.len() == 2
    }

    /// First atom.
    pub fn source(&self) -> &str {
        &self.atoms[0]
    }

    /// All atoms after the source.
    pub fn targets(&self) -> &[String] {
        &self.atoms[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_validation() {
        let none: [&str; 0] = [];
        assert!(matches!(
            Relation::new("r", none),
            Err(RelationError::InsufficientArity { arity: 0, .. })
        ));
        assert!(matches!(
            Relation::new("r", ["a"]),
            Err(RelationError::InsufficientArity { arity: 1, .. })
        ));
        assert!(Relation::new("r", ["a", "b"]).is_ok());
        assert!(Relation::new("r", ["a", "b", "c", "d"]).is_ok());
    }

    #[test]
    fn test_binary_and_nary() {
        let rel = Relation::binary("follows", "user1", "user2");
        assert!(rel.is_binary());
        assert_eq!(rel.arity(), 2);
        assert_eq!(rel.source(), "user1");
        assert_eq!(rel.targets(), ["user2".to_string()]);

        let meeting = Relation::new("meeting", ["p1", "p2", "room"]).unwrap();
        assert!(!meeting.is_binary());
        assert_eq!(meeting.arity(), 3);
    }

    #[test]
    fn test_deserialize_rejects_unary() {
        let bad = serde_json::json!({"name": "r", "atoms": ["only"]});
        assert!(serde_json::from_value::<Relation>(bad).is_err());

        let good = serde_json::json!({"name": "r", "atoms": ["a", "b"]});
        let rel: Relation = serde_json::from_value(good).unwrap();
        assert_eq!(rel.name(), "r");
    }
}
