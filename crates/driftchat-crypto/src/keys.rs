//! secp256k1 keypair and public key wrappers.
//!
//! Identity keys and pre-keys are both plain secp256k1 keypairs; what
//! distinguishes them is who signs their public half. Public keys
//! travel in uncompressed SEC1 form (65 bytes, `0x04` prefix).

use driftchat_types::{DriftchatError, Result};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::ser;

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// secp256k1 public key in uncompressed SEC1 encoding.
///
/// Layout: `[ 0x04 || X || Y ]`, 65 bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "ser::fixed_bytes")] [u8; 65]);

impl PublicKey {
    /// Fixed byte length of an uncompressed secp256k1 public key.
    pub const LEN: usize = 65;

    /// Creates a [`PublicKey`] from raw bytes, validating that they
    /// encode a point on the curve.
    ///
    /// # Errors
    ///
    /// Returns [`DriftchatError::Protocol`] if the bytes are not a
    /// valid uncompressed SEC1 point.
    pub fn from_bytes(bytes: [u8; 65]) -> Result<Self> {
        k256::PublicKey::from_sec1_bytes(&bytes).map_err(|_| DriftchatError::Protocol {
            reason: "invalid secp256k1 public key encoding".into(),
        })?;
        Ok(Self(bytes))
    }

    /// Creates a [`PublicKey`] from a variable-length slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(DriftchatError::Protocol {
                reason: format!("expected 65-byte public key, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 65];
        arr.copy_from_slice(bytes);
        Self::from_bytes(arr)
    }

    /// Returns the full 65-byte SEC1 encoding.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Returns the 64 coordinate bytes `X || Y` (prefix stripped).
    pub fn coordinates(&self) -> &[u8] {
        &self.0[1..]
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Recoverable ECDSA signature: compact `[ R || S ]` plus recovery bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Compact representation `[ R || S ]`, 64 bytes.
    #[serde(with = "ser::fixed_bytes")]
    bytes: [u8; 64],
    /// Recovery bit (0 or 1).
    recovery_id: u8,
}

impl Signature {
    /// Fixed byte length of the compact representation.
    pub const LEN: usize = 64;

    /// Creates a [`Signature`] from its compact bytes and recovery bit.
    pub fn new(bytes: [u8; 64], recovery_id: u8) -> Self {
        Self { bytes, recovery_id }
    }

    /// Returns the compact `[ R || S ]` bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// Returns the recovery bit.
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// secp256k1 signing keypair.
///
/// The wrapped `k256` signing key zeroizes its scalar on drop.
pub struct Keypair {
    signing: SigningKey,
}

// Keypair does not implement Clone/Debug to prevent leakage.

impl Keypair {
    /// Generates a fresh keypair from OS entropy.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a keypair from a raw 32-byte big-endian scalar.
    ///
    /// # Errors
    ///
    /// Returns [`DriftchatError::Invariant`] if the scalar is zero or
    /// not in the field.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing = SigningKey::from_slice(bytes).map_err(|_| DriftchatError::Invariant {
            reason: "invalid secp256k1 private scalar".into(),
        })?;
        Ok(Self { signing })
    }

    /// Returns the raw 32-byte big-endian scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        let field_bytes = self.signing.to_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&field_bytes);
        out
    }

    /// Derives the uncompressed public key.
    pub fn public_key(&self) -> PublicKey {
        let point = self.signing.verifying_key().to_encoded_point(false);
        let mut bytes = [0u8; 65];
        bytes.copy_from_slice(point.as_bytes());
        PublicKey(bytes)
    }

    /// Access to the inner signing key for ECDH and ECDSA.
    pub(crate) fn signing(&self) -> &SigningKey {
        &self.signing
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_from_seed() -> Result<()> {
        let mut seed = [0u8; 32];
        seed[31] = 0x42;
        let a = Keypair::from_bytes(&seed)?;
        let b = Keypair::from_bytes(&seed)?;
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.to_bytes(), seed);
        Ok(())
    }

    #[test]
    fn zero_scalar_rejected() {
        assert!(Keypair::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn public_key_roundtrip() -> Result<()> {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        assert_eq!(pk.as_bytes()[0], 0x04);
        let restored = PublicKey::from_bytes(*pk.as_bytes())?;
        assert_eq!(restored, pk);
        Ok(())
    }

    #[test]
    fn invalid_point_rejected() {
        let mut bytes = [0u8; 65];
        bytes[0] = 0x04;
        bytes[64] = 0x01; // not on the curve
        assert!(PublicKey::from_bytes(bytes).is_err());
    }
}
