//! Core shared types for the Driftchat messaging core.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// 20-byte wallet account address.
///
/// This is the primary identity of a participant. Derived from the last 20
/// bytes of the keccak-256 hash of an uncompressed secp256k1 public key
/// (without the 0x04 prefix byte). Rendered as checksummed hex.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    /// The fixed byte length of an address.
    pub const LEN: usize = 20;

    /// Creates a new `Address` from raw bytes.
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Renders the address as `0x`-prefixed checksummed hex.
    ///
    /// The checksum is the usual mixed-case scheme: a hex letter is
    /// uppercased when the corresponding nibble of
    /// `keccak256(lowercase_hex)` is 8 or above.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_string())
    }
}

impl FromStr for Address {
    type Err = DriftchatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex_part = s.strip_prefix("0x").ok_or_else(|| DriftchatError::InvalidArgument {
            reason: "address must start with 0x".into(),
        })?;
        let bytes = hex::decode(hex_part).map_err(|_| DriftchatError::InvalidArgument {
            reason: "invalid hex encoding in address".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(DriftchatError::InvalidArgument {
                reason: format!("expected 20 bytes, got {}", bytes.len()),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        let addr = Self(arr);

        // Mixed-case input must carry a valid checksum. Single-case input
        // (all lower or all upper) is accepted without one.
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && addr.to_checksum_string() != s {
            return Err(DriftchatError::InvalidArgument {
                reason: "address checksum mismatch".into(),
            });
        }
        Ok(addr)
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Nanoseconds since the Unix epoch, UTC.
///
/// The protocol exchanges raw nanosecond counts on the wire; chrono
/// conversion is provided for display and range queries only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        let ns = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        Self(ns.max(0) as u64)
    }

    /// Creates a `Timestamp` from raw nanoseconds since the epoch.
    pub fn from_ns(ns: u64) -> Self {
        Self(ns)
    }

    /// Returns the raw nanosecond count.
    pub fn as_ns(&self) -> u64 {
        self.0
    }

    /// Converts to a chrono `DateTime<Utc>`.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0 as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_datetime().to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// ConversationContext
// ---------------------------------------------------------------------------

/// Application-defined context attached to a v2 conversation.
///
/// The `conversation_id` participates in deterministic topic derivation,
/// so two sessions with the same peer but different IDs are distinct.
/// Metadata is exposed to applications and usable for filtering; it does
/// not influence key derivation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Expected to be a URI (e.g. `example.com/convo1`).
    pub conversation_id: String,
    /// Additional key/value metadata.
    pub metadata: BTreeMap<String, String>,
}

impl ConversationContext {
    /// Creates a context with the given conversation ID and no metadata.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            metadata: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentTypeId
// ---------------------------------------------------------------------------

/// Identifies the type of content carried in a message payload.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContentTypeId {
    /// Authority governing this content type.
    pub authority_id: String,
    /// Type identifier within the authority.
    pub type_id: String,
    /// Major version of the type.
    pub version_major: u32,
    /// Minor version of the type.
    pub version_minor: u32,
}

impl ContentTypeId {
    /// Creates a new `ContentTypeId`.
    pub fn new(
        authority_id: impl Into<String>,
        type_id: impl Into<String>,
        version_major: u32,
        version_minor: u32,
    ) -> Self {
        Self {
            authority_id: authority_id.into(),
            type_id: type_id.into(),
            version_major,
            version_minor,
        }
    }
}

impl fmt::Display for ContentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}.{}",
            self.authority_id, self.type_id, self.version_major, self.version_minor
        )
    }
}

// ---------------------------------------------------------------------------
// EncodedContent
// ---------------------------------------------------------------------------

/// Recognized compression algorithms for encoded content.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContentCompression {
    /// Raw DEFLATE.
    Deflate,
    /// Gzip (DEFLATE with header and trailer).
    Gzip,
}

/// Content bundled with the metadata required to decode and present it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncodedContent {
    /// Content type identifier matching the payload with a codec.
    pub content_type: ContentTypeId,
    /// Optional encoding parameters required for correct decoding.
    pub parameters: BTreeMap<String, String>,
    /// Optional fallback description for clients that cannot decode
    /// or render the content.
    pub fallback: Option<String>,
    /// Compression applied to `content`, if any.
    pub compression: Option<ContentCompression>,
    /// The encoded content bytes themselves.
    pub content: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DriftchatError>;

/// All errors surfaced by the Driftchat core.
#[derive(Debug, Error)]
pub enum DriftchatError {
    /// AEAD tag mismatch, signature mismatch, or wallet-address mismatch.
    ///
    /// Deliberately carries no detail: callers must not be able to
    /// distinguish which check failed.
    #[error("could not decrypt or verify")]
    AuthFailure,

    /// A referenced entity does not exist (peer not on the network,
    /// unknown conversation for a received envelope).
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The caller supplied an invalid input (sending to self, malformed
    /// topic, unknown content-type codec).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Human-readable description of the invalid input.
        reason: String,
    },

    /// A networking or transport operation failed.
    #[error("transport error: {reason}")]
    Transport {
        /// Human-readable description of the transport failure.
        reason: String,
    },

    /// An internal invariant was violated; programmer error.
    #[error("invariant violation: {reason}")]
    Invariant {
        /// Human-readable description of the violated invariant.
        reason: String,
    },

    /// A wire serialization or deserialization failure.
    #[error("protocol error: {reason}")]
    Protocol {
        /// Human-readable description of the protocol failure.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Signable
// ---------------------------------------------------------------------------

/// Trait for types that can produce canonical bytes for signing.
///
/// Implementors define how their data is serialized into the byte
/// sequence that will be signed. The crypto crate performs the actual
/// signing; this trait lives in `driftchat-types` so the protocol and
/// crypto crates can reference it without circular dependencies.
pub trait Signable {
    /// Returns the canonical byte representation to be signed.
    fn signable_bytes(&self) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_checksum_known_vector() {
        // EIP-55 test vector.
        let addr: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse()
            .expect("valid checksummed address");
        assert_eq!(
            addr.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn address_lowercase_accepted() {
        let addr: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
            .parse()
            .expect("all-lowercase address is accepted");
        assert_eq!(
            addr.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn address_bad_checksum_rejected() {
        // Flip the case of one letter in an otherwise valid address.
        let result: std::result::Result<Address, _> =
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD".parse();
        assert!(result.is_err());
    }

    #[test]
    fn address_without_prefix_rejected() {
        let result: std::result::Result<Address, _> =
            "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse();
        assert!(result.is_err());
    }

    #[test]
    fn timestamp_roundtrip() {
        let ts = Timestamp::from_ns(1_700_000_000_000_000_123);
        assert_eq!(ts.as_ns(), 1_700_000_000_000_000_123);
        assert_eq!(ts.as_datetime().timestamp(), 1_700_000_000);
    }

    #[test]
    fn content_type_display() {
        let id = ContentTypeId::new("xmtp.org", "text", 1, 0);
        assert_eq!(id.to_string(), "xmtp.org/text:1.0");
    }

    #[test]
    fn auth_failure_carries_no_detail() {
        assert_eq!(
            DriftchatError::AuthFailure.to_string(),
            "could not decrypt or verify"
        );
    }
}
