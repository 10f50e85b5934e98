//! Decrypted and decoded message shapes.
//!
//! A [`DecryptedMessage`] is an unsealed payload still in its encoded
//! content form; a [`DecodedMessage`] additionally ran the content
//! codec. Listing and streaming APIs come in both flavors.

use driftchat_crypto::hash::sha256;
use driftchat_protocol::codec::{CodecRegistry, DecodedBody};
use driftchat_types::{Address, ContentTypeId, EncodedContent, Result, Timestamp};

/// Computes the message identifier for an envelope payload:
/// hex-encoded SHA-256 of the sealed bytes.
pub fn message_id(envelope_payload: &[u8]) -> String {
    hex::encode(sha256(envelope_payload))
}

// ---------------------------------------------------------------------------
// DecryptedMessage
// ---------------------------------------------------------------------------

/// An unsealed message before codec decoding.
#[derive(Clone, Debug)]
pub struct DecryptedMessage {
    /// Hex SHA-256 of the sealed envelope payload.
    pub id: String,
    /// Verified sender wallet address.
    pub sender_address: Address,
    /// Sender-specified creation time.
    pub sent: Timestamp,
    /// Topic the envelope arrived on.
    pub content_topic: String,
    /// The decrypted, still encoded content (decompressed).
    pub content: EncodedContent,
}

// ---------------------------------------------------------------------------
// DecodedMessage
// ---------------------------------------------------------------------------

/// A fully decoded message.
#[derive(Clone, Debug)]
pub struct DecodedMessage {
    /// Hex SHA-256 of the sealed envelope payload.
    pub id: String,
    /// Verified sender wallet address.
    pub sender_address: Address,
    /// Sender-specified creation time.
    pub sent: Timestamp,
    /// Topic the envelope arrived on.
    pub content_topic: String,
    /// Content type of the payload.
    pub content_type: ContentTypeId,
    /// Codec-decoded body.
    pub body: DecodedBody,
    /// Out-of-band description carried with the content, if any.
    pub fallback: Option<String>,
}

impl DecodedMessage {
    /// Runs the codec registry over a decrypted message.
    ///
    /// # Errors
    ///
    /// [`driftchat_types::DriftchatError::InvalidArgument`] when no
    /// codec is registered for the content type; codec errors pass
    /// through.
    pub fn from_decrypted(message: DecryptedMessage, codecs: &CodecRegistry) -> Result<Self> {
        let body = codecs.decode(&message.content)?;
        Ok(Self {
            id: message.id,
            sender_address: message.sender_address,
            sent: message.sent,
            content_topic: message.content_topic,
            content_type: message.content.content_type,
            body,
            fallback: message.content.fallback,
        })
    }

    /// The text body, when the payload decoded to text.
    pub fn text(&self) -> Option<&str> {
        self.body.as_text()
    }
}
