//! Canonical CBOR encoding per RFC 8949 §4.2 (Core Deterministic Encoding).
//!
//! Key material is signed over its canonical CBOR representation so a
//! signature stays valid across implementations regardless of field
//! ordering. The encoding guarantees:
//!
//! - **Sorted keys**: map keys ordered by their CBOR-encoded byte form
//!   (shortest first, then bytewise lexicographic).
//! - **Definite-length**: all maps and byte/text strings use
//!   definite-length encoding.
//! - **Preferred integers**: integers use the shortest encoding.
//!
//! The canonical key order for an unsigned public key map (2 entries):
//!
//! | # | Key                      | CBOR type | Encoded key prefix |
//! |---|--------------------------|-----------|--------------------|
//! | 1 | `"createdNs"`            | Unsigned  | `0x69` (len 9)     |
//! | 2 | `"secp256k1Uncompressed"`| Bytes     | `0x75` (len 21)    |

use ciborium::Value;
use driftchat_types::{DriftchatError, Result};

use driftchat_crypto::keys::PublicKey;

/// Key names in RFC 8949 canonical sort order.
const CANONICAL_KEYS: [&str; 2] = ["createdNs", "secp256k1Uncompressed"];

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Serializes an unsigned public key to canonical CBOR.
///
/// The output bytes are both the signing preimage and the `key_bytes`
/// carried verbatim inside a signed public key.
///
/// # Errors
///
/// Returns [`DriftchatError::Protocol`] if CBOR serialization fails
/// (should not happen for well-formed keys).
pub fn unsigned_key_to_cbor(created_ns: u64, public_key: &PublicKey) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (
            Value::Text(CANONICAL_KEYS[0].into()),
            Value::Integer(created_ns.into()),
        ),
        (
            Value::Text(CANONICAL_KEYS[1].into()),
            Value::Bytes(public_key.as_bytes().to_vec()),
        ),
    ]);

    let mut buf = Vec::new();
    ciborium::ser::into_writer(&value, &mut buf).map_err(|e| DriftchatError::Protocol {
        reason: format!("canonical CBOR serialization failed: {e}"),
    })?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Deserializes canonical unsigned-public-key bytes.
///
/// # Errors
///
/// Returns [`DriftchatError::Protocol`] if the bytes are not a
/// well-formed canonical key map.
pub fn unsigned_key_from_cbor(bytes: &[u8]) -> Result<(u64, PublicKey)> {
    let value: Value =
        ciborium::de::from_reader(bytes).map_err(|e| DriftchatError::Protocol {
            reason: format!("canonical CBOR deserialization failed: {e}"),
        })?;

    let entries = match value {
        Value::Map(entries) => entries,
        _ => {
            return Err(DriftchatError::Protocol {
                reason: "canonical key encoding is not a CBOR map".into(),
            })
        }
    };

    let mut created_ns: Option<u64> = None;
    let mut key_bytes: Option<Vec<u8>> = None;

    for (key, val) in entries {
        let name = match key {
            Value::Text(name) => name,
            _ => {
                return Err(DriftchatError::Protocol {
                    reason: "canonical key map contains a non-text key".into(),
                })
            }
        };
        match (name.as_str(), val) {
            ("createdNs", Value::Integer(i)) => {
                created_ns = Some(u64::try_from(i).map_err(|_| DriftchatError::Protocol {
                    reason: "createdNs out of range".into(),
                })?);
            }
            ("secp256k1Uncompressed", Value::Bytes(b)) => key_bytes = Some(b),
            (other, _) => {
                return Err(DriftchatError::Protocol {
                    reason: format!("unexpected canonical key field '{other}'"),
                })
            }
        }
    }

    let created_ns = created_ns.ok_or_else(|| DriftchatError::Protocol {
        reason: "canonical key missing createdNs".into(),
    })?;
    let key_bytes = key_bytes.ok_or_else(|| DriftchatError::Protocol {
        reason: "canonical key missing secp256k1Uncompressed".into(),
    })?;

    Ok((created_ns, PublicKey::from_slice(&key_bytes)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
