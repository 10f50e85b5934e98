//! HKDF-SHA256 key derivation.
//!
//! Implements the HMAC-based Extract-and-Expand Key Derivation Function
//! (RFC 5869) using SHA-256 as the underlying hash. Used to derive
//! per-message AEAD keys from session secrets and to derive v2 session
//! key material from ECDH shared secrets.
//!
//! The output is automatically zeroized on drop to minimize the time
//! sensitive material resides in memory.

use driftchat_types::{DriftchatError, Result};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum output length in bytes.
///
/// HKDF-SHA256 can produce up to `255 × 32 = 8160` bytes, but we cap at
/// 64 to prevent misuse. Typical usage is 32 bytes (one AES-256 key).
const MAX_OUTPUT_LEN: usize = 64;

// ---------------------------------------------------------------------------
// HkdfOutput
// ---------------------------------------------------------------------------

/// Variable-length key material derived by HKDF-SHA256.
///
/// Zeroized when dropped to prevent sensitive material from lingering
/// in memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HkdfOutput {
    bytes: Vec<u8>,
}

impl HkdfOutput {
    /// Returns the derived key material as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the derived material into a fixed 32-byte array.
    ///
    /// # Errors
    ///
    /// Returns [`DriftchatError::Invariant`] if the output is not
    /// exactly 32 bytes long.
    pub fn to_key(&self) -> Result<[u8; 32]> {
        if self.bytes.len() != 32 {
            return Err(DriftchatError::Invariant {
                reason: format!("expected 32-byte derivation, got {}", self.bytes.len()),
            });
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.bytes);
        Ok(out)
    }
}

// HkdfOutput does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derives key material from input keying material using HKDF-SHA256.
///
/// # Parameters
///
/// - `ikm` — input keying material (e.g. an ECDH shared secret).
/// - `salt` — optional salt. An empty slice is valid per RFC 5869 §3.1;
///   the implementation substitutes a zero-filled salt of hash length.
/// - `info` — context and application-specific information.
/// - `output_len` — desired output length in bytes, in `1..=64`.
///
/// # Errors
///
/// Returns [`DriftchatError::Invariant`] if `output_len` is 0 or
/// exceeds the 64-byte cap, or if HKDF expansion fails.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], output_len: usize) -> Result<HkdfOutput> {
    if output_len == 0 {
        return Err(DriftchatError::Invariant {
            reason: "HKDF output length must be at least 1 byte".into(),
        });
    }
    if output_len > MAX_OUTPUT_LEN {
        return Err(DriftchatError::Invariant {
            reason: format!("HKDF output length {output_len} exceeds maximum {MAX_OUTPUT_LEN}"),
        });
    }

    let salt_opt: Option<&[u8]> = if salt.is_empty() { None } else { Some(salt) };

    let hk = Hkdf::<Sha256>::new(salt_opt, ikm);

    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm).map_err(|e| DriftchatError::Invariant {
        reason: format!("HKDF-SHA256 expansion failed: {e}"),
    })?;

    Ok(HkdfOutput { bytes: okm })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
