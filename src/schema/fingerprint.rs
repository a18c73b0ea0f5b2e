//! Content hashing for schema change detection.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 of a serializable value.
///
/// The value is serialized to JSON first, so maps must have a stable order
/// (`BTreeMap`) for the digest to be deterministic. Returns 64 lowercase
/// hex characters.
pub fn compute_fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}
