//! Build policy definitions.

pub mod v1;

pub use v1::{BuildPolicyV1, PolicyError, DEFAULT_MAX_DEPTH};
