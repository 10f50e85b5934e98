//! Direct-addressed sealed messages (v1).
//!
//! A v1 message carries both participants' public bundles in its
//! header and derives the message secret with the combined three-way
//! ECDH — no session state beyond the peer's published bundle is
//! needed, at the cost of key agreement on every message.

use driftchat_crypto::aead::{self, Ciphertext};
use driftchat_types::{Address, DriftchatError, Result, Timestamp};
use serde::{Deserialize, Serialize};

use crate::keys::{PrivateKeyBundle, PublicKeyBundle};
use crate::wire;

// ---------------------------------------------------------------------------
// MessageHeaderV1
// ---------------------------------------------------------------------------

/// v1 message header, encoded separately because its bytes double as
/// the AEAD associated data.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaderV1 {
    /// The sender's v1 bundle.
    pub sender: PublicKeyBundle,
    /// The recipient's v1 bundle.
    pub recipient: PublicKeyBundle,
    /// Sender-specified creation time, nanoseconds since the epoch.
    pub timestamp_ns: u64,
}

// ---------------------------------------------------------------------------
// MessageV1
// ---------------------------------------------------------------------------

/// A sealed v1 message: header bytes plus ciphertext.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageV1 {
    /// Encoded [`MessageHeaderV1`], used verbatim as AEAD AAD.
    pub header_bytes: Vec<u8>,
    /// Sealed payload (an encoded content record).
    pub ciphertext: Ciphertext,
}

impl MessageV1 {
    /// Seals `payload` from `own` to `recipient`.
    ///
    /// The recipient bundle must already be verified (the contact
    /// lookup path does this before any send).
    pub fn seal(
        own: &PrivateKeyBundle,
        recipient: &PublicKeyBundle,
        payload: &[u8],
        timestamp: Timestamp,
    ) -> Result<Self> {
        let header = MessageHeaderV1 {
            sender: own.legacy_bundle()?,
            recipient: recipient.clone(),
            timestamp_ns: timestamp.as_ns(),
        };
        let header_bytes = wire::encode(&header)?;

        let secret = own.shared_secret(
            &recipient.identity_key.public_key,
            &recipient.pre_key.public_key,
            &header.sender.pre_key.public_key,
            false,
        )?;
        let ciphertext = aead::seal(&secret, payload, &header_bytes)?;

        Ok(Self {
            header_bytes,
            ciphertext,
        })
    }

    /// Decodes the header.
    pub fn header(&self) -> Result<MessageHeaderV1> {
        wire::decode(&self.header_bytes)
    }

    /// Verifies the sender bundle and returns its wallet address.
    pub fn sender_address(&self) -> Result<Address> {
        self.header()
            .map_err(|_| DriftchatError::AuthFailure)?
            .sender
            .verify()
    }

    /// The sender-specified creation time.
    pub fn timestamp(&self) -> Result<Timestamp> {
        Ok(Timestamp::from_ns(self.header()?.timestamp_ns))
    }

    /// Opens the message as the recipient named in the header.
    ///
    /// Recomputes the combined secret from `own`'s private halves
    /// against the claimed sender public halves, then opens with the
    /// header bytes as AAD.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] uniformly: broken sender
    /// signature chain, recipient wallet that is not `own`, unknown
    /// local pre-key, or AEAD tag mismatch.
    pub fn open(&self, own: &PrivateKeyBundle) -> Result<Vec<u8>> {
        let header: MessageHeaderV1 =
            wire::decode(&self.header_bytes).map_err(|_| DriftchatError::AuthFailure)?;

        header.sender.verify()?;
        let recipient_wallet = header.recipient.verify()?;
        if recipient_wallet != own.wallet_address() {
            return Err(DriftchatError::AuthFailure);
        }

        let secret = own.shared_secret(
            &header.sender.identity_key.public_key,
            &header.sender.pre_key.public_key,
            &header.recipient.pre_key.public_key,
            true,
        )?;
        aead::open(&secret, &self.ciphertext, &self.header_bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
