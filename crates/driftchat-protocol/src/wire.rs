//! CBOR wire encoding for protocol records.
//!
//! All records exchanged with the relay are structured CBOR. This
//! module wraps `ciborium` with the workspace error type; canonical
//! (byte-deterministic) encoding of signed material lives in
//! [`crate::canonical`].

use driftchat_types::{DriftchatError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a record to CBOR bytes.
///
/// # Errors
///
/// Returns [`DriftchatError::Protocol`] if serialization fails
/// (should not happen for well-formed records).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| DriftchatError::Protocol {
        reason: format!("CBOR serialization failed: {e}"),
    })?;
    Ok(buf)
}

/// Deserializes a record from CBOR bytes.
///
/// # Errors
///
/// Returns [`DriftchatError::Protocol`] on malformed input.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| DriftchatError::Protocol {
        reason: format!("CBOR deserialization failed: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
