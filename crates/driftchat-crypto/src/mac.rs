//! HMAC-SHA256 message authentication codes.
//!
//! Provides keyed HMAC-SHA256 computation and constant-time
//! verification. Used for v2 sender authentication tags and for
//! deterministic topic-seed derivation.

use driftchat_types::{DriftchatError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256 type alias.
type HmacSha256 = Hmac<Sha256>;

/// Fixed output length of HMAC-SHA256 in bytes.
pub const HMAC_SHA256_LEN: usize = 32;

/// Computes HMAC-SHA256 over `data` using `key`.
///
/// # Parameters
///
/// - `key` — HMAC key (any length; 32 bytes recommended).
/// - `data` — data to authenticate.
///
/// # Errors
///
/// Returns [`DriftchatError::Invariant`] if HMAC initialisation fails
/// (should not happen with SHA-256, but we avoid `unwrap`).
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| DriftchatError::Invariant {
        reason: format!("HMAC-SHA256 key init failed: {e}"),
    })?;
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    Ok(output)
}

/// Verifies an HMAC-SHA256 tag in constant time.
///
/// # Errors
///
/// Returns [`DriftchatError::AuthFailure`] if the computed tag does
/// not match `expected`.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], expected: &[u8]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| DriftchatError::Invariant {
        reason: format!("HMAC-SHA256 key init failed: {e}"),
    })?;
    mac.update(data);

    mac.verify_slice(expected)
        .map_err(|_| DriftchatError::AuthFailure)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_and_verify() -> Result<()> {
        let tag = hmac_sha256(b"key", b"data")?;
        verify_hmac_sha256(b"key", b"data", &tag)
    }

    #[test]
    fn tampered_data_rejected() -> Result<()> {
        let tag = hmac_sha256(b"key", b"data")?;
        assert!(matches!(
            verify_hmac_sha256(b"key", b"datb", &tag),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn wrong_key_rejected() -> Result<()> {
        let tag = hmac_sha256(b"key", b"data")?;
        assert!(verify_hmac_sha256(b"other", b"data", &tag).is_err());
        Ok(())
    }

    #[test]
    fn rfc4231_case_2() -> Result<()> {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .expect("valid hex");
        let tag = hmac_sha256(b"Jefe", b"what do ya want for nothing?")?;
        assert_eq!(tag.as_slice(), expected.as_slice());
        Ok(())
    }
}
