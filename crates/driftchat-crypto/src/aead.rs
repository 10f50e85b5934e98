//! AES-256-GCM authenticated encryption with HKDF-SHA256-derived keys.
//!
//! Every [`seal`] call draws a fresh 32-byte HKDF salt and a fresh
//! 12-byte GCM nonce from OS entropy and derives a one-off AES key from
//! the caller's secret. Even when the input secret is long-lived session
//! key material, no two messages share an AEAD key, so nonce reuse
//! across messages is harmless provided the salt differs.
//!
//! Wire shape:
//!   [ hkdf_salt (32 bytes) | gcm_nonce (12 bytes) | payload + tag ]

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use driftchat_types::{DriftchatError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::hkdf::hkdf_sha256;
use crate::ser;

/// Fixed byte length of the HKDF salt.
pub const HKDF_SALT_LEN: usize = 32;

/// Fixed byte length of the AES-GCM nonce.
pub const GCM_NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Ciphertext
// ---------------------------------------------------------------------------

/// Sealed payload tagged with the construction
/// "AES-256-GCM with HKDF-SHA256-derived key".
///
/// Carries everything the recipient needs besides the shared secret:
/// the HKDF salt, the GCM nonce, and the ciphertext with the 16-byte
/// authentication tag appended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// Per-message HKDF salt (32 bytes).
    #[serde(with = "ser::fixed_bytes")]
    pub hkdf_salt: [u8; HKDF_SALT_LEN],
    /// AES-GCM nonce (12 bytes).
    #[serde(with = "ser::fixed_bytes")]
    pub gcm_nonce: [u8; GCM_NONCE_LEN],
    /// Encrypted payload with the 16-byte tag appended.
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Seal / Open
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` under a key derived from `secret`.
///
/// # Parameters
///
/// - `secret` — input keying material (ECDH output or session key
///   material). Never used directly as an AES key.
/// - `plaintext` — data to encrypt.
/// - `aad` — additional authenticated data, typically the serialized
///   message header. Authenticated but not encrypted.
///
/// # Errors
///
/// Returns [`DriftchatError::Invariant`] if key derivation or
/// encryption fails; neither should happen with valid inputs.
pub fn seal(secret: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Ciphertext> {
    let mut hkdf_salt = [0u8; HKDF_SALT_LEN];
    OsRng.fill_bytes(&mut hkdf_salt);
    let mut gcm_nonce = [0u8; GCM_NONCE_LEN];
    OsRng.fill_bytes(&mut gcm_nonce);

    let key = hkdf_sha256(secret, &hkdf_salt, b"", 32)?;

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| DriftchatError::Invariant {
            reason: format!("AES-256-GCM key init failed: {e}"),
        })?;

    let payload = cipher
        .encrypt(
            Nonce::from_slice(&gcm_nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| DriftchatError::Invariant {
            reason: "AES-256-GCM encryption failed".into(),
        })?;

    Ok(Ciphertext {
        hkdf_salt,
        gcm_nonce,
        payload,
    })
}

/// Decrypts a [`Ciphertext`] sealed with [`seal`].
///
/// # Errors
///
/// Any failure — tag mismatch, wrong secret, wrong AAD — surfaces
/// uniformly as [`DriftchatError::AuthFailure`]; callers cannot
/// distinguish the cause.
pub fn open(secret: &[u8], ciphertext: &Ciphertext, aad: &[u8]) -> Result<Vec<u8>> {
    let key = hkdf_sha256(secret, &ciphertext.hkdf_salt, b"", 32)
        .map_err(|_| DriftchatError::AuthFailure)?;

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| DriftchatError::AuthFailure)?;

    cipher
        .decrypt(
            Nonce::from_slice(&ciphertext.gcm_nonce),
            Payload {
                msg: &ciphertext.payload,
                aad,
            },
        )
        .map_err(|_| DriftchatError::AuthFailure)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() -> Result<()> {
        let secret = [0x42u8; 32];
        let sealed = seal(&secret, b"hello driftchat", b"header")?;
        assert_eq!(sealed.payload.len(), b"hello driftchat".len() + 16);

        let opened = open(&secret, &sealed, b"header")?;
        assert_eq!(opened.as_slice(), b"hello driftchat");
        Ok(())
    }

    #[test]
    fn wrong_aad_rejected() -> Result<()> {
        let secret = [0x42u8; 32];
        let sealed = seal(&secret, b"payload", b"aad")?;
        assert!(matches!(
            open(&secret, &sealed, b"other"),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn wrong_secret_rejected() -> Result<()> {
        let sealed = seal(&[0x01u8; 32], b"payload", b"")?;
        assert!(open(&[0x02u8; 32], &sealed, b"").is_err());
        Ok(())
    }

    #[test]
    fn tampered_payload_rejected() -> Result<()> {
        let secret = [0x42u8; 32];
        let mut sealed = seal(&secret, b"payload", b"")?;
        sealed.payload[0] ^= 0x01;
        assert!(matches!(
            open(&secret, &sealed, b""),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn fresh_salt_and_nonce_per_seal() -> Result<()> {
        let secret = [0x42u8; 32];
        let a = seal(&secret, b"same", b"")?;
        let b = seal(&secret, b"same", b"")?;
        assert_ne!(a.hkdf_salt, b.hkdf_salt);
        assert_ne!(a.payload, b.payload);
        Ok(())
    }

    #[test]
    fn empty_plaintext_roundtrip() -> Result<()> {
        let secret = [0x07u8; 32];
        let sealed = seal(&secret, b"", b"")?;
        assert_eq!(sealed.payload.len(), 16); // tag only
        assert!(open(&secret, &sealed, b"")?.is_empty());
        Ok(())
    }
}
