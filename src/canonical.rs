//! Canonical serialization for deterministic hashing.
//!
//! This module provides functions to serialize data in a canonical, deterministic format
//! suitable for hashing and fingerprinting built graphs.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use Vec or BTreeMap for maps in hashed data
//! - Stable float format: f64 serialize consistently

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Number of hex characters kept by [`short_hash`].
pub const SHORT_HASH_LEN: usize = 8;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    let bytes = to_canonical_bytes(value)?;
    Ok(xxh64(&bytes, 0))
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

/// Hash raw text with xxh64.
pub fn text_hash(text: &str) -> u64 {
    xxh64(text.as_bytes(), 0)
}

/// Short, human-friendly hex tag for a piece of text.
///
/// Used for value-derived primitive ids and fallback labels; collisions are
/// tolerable there because the tag is never used as a lookup key on its own.
pub fn short_hash(text: &str) -> String {
    let mut hex = format!("{:016x}", text_hash(text));
    hex.truncate(SHORT_HASH_LEN);
    hex
}
