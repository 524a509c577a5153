//! BuildPolicy v1: traversal limits and decomposition switches.
//!
//! The policy travels with every build. Its `params_hash` identifies the
//! exact settings that produced a [`DataInstance`](crate::DataInstance), so
//! two instances are only comparable by fingerprint when their policy hashes
//! match.

use serde::{Deserialize, Serialize};

use crate::canonical::text_hash;
use crate::DEFAULT_POLICY_VERSION;

/// Default recursion ceiling for one build.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Invalid policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// A zero depth ceiling would reject every non-scalar root's children.
    #[error("max_depth must be at least 1")]
    ZeroDepth,
    /// Unknown version string.
    #[error("Unsupported policy version: {0}")]
    UnsupportedVersion(String),
}

/// Build policy version 1.
///
/// ## Parameters
///
/// - `max_depth`: Recursion ceiling; the root is walked at depth 0
/// - `skip_private_fields`: Skip `_`-prefixed record fields and object attributes
/// - `primitive_collapsing`: Give equal scalars one value-derived atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Maximum recursion depth.
    pub max_depth: usize,
    /// Whether private fields are skipped.
    pub skip_private_fields: bool,
    /// Whether equal scalars collapse onto one atom.
    pub primitive_collapsing: bool,
}

impl BuildPolicyV1 {
    /// Create a policy with a custom depth ceiling and default switches.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Check parameters before a build starts.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version != DEFAULT_POLICY_VERSION {
            return Err(PolicyError::UnsupportedVersion(self.version.clone()));
        }
        if self.max_depth == 0 {
            return Err(PolicyError::ZeroDepth);
        }
        Ok(())
    }

    /// Compute a hash of the policy parameters.
    pub fn params_hash(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}",
            self.version,
            self.max_depth,
            self.skip_private_fields,
            self.primitive_collapsing,
        );
        format!("{:016x}", text_hash(&canonical))
    }

    /// Create a minimal policy for testing.
    #[cfg(test)]
    pub fn minimal() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            max_depth: 8,
            skip_private_fields: true,
            primitive_collapsing: true,
        }
    }
}

impl Default for BuildPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            skip_private_fields: true,
            primitive_collapsing: true,
        }
    }
}
