//! Keccak-256 and SHA-256 hashing.
//!
//! Keccak-256 (the pre-standard SHA-3 variant used by wallet accounts)
//! drives address derivation and signing digests; SHA-256 is used for
//! message identifiers.

use sha2::{Digest as Sha2Digest, Sha256};
use sha3::{Digest, Keccak256};

/// Computes the keccak-256 hash of arbitrary data.
///
/// Returns a fixed 32-byte digest. Deterministic: identical inputs
/// always produce identical outputs.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Computes the SHA-256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
