//! Session-key sealed messages (v2).
//!
//! A v2 message is sealed under the session's 32-byte key material —
//! no per-message ECDH, which is the performance advantage over v1.
//! The header authenticates the sender bundle and creation time as
//! AAD, and an additional HMAC over the header bytes lets the relay
//! attribute messages to a sender without opening them.

use driftchat_crypto::aead::{self, Ciphertext};
use driftchat_crypto::hkdf::hkdf_sha256;
use driftchat_crypto::mac::{hmac_sha256, verify_hmac_sha256};
use driftchat_types::{Address, DriftchatError, Result, Timestamp};
use serde::{Deserialize, Serialize};

use crate::keys::{PrivateKeyBundle, SignedPublicKeyBundle};
use crate::wire;

/// HKDF info string for the sender-HMAC key.
const HMAC_INFO: &[u8] = b"xmtp/v2/hmac";

/// Derives the sender-HMAC key from session key material.
fn hmac_key(key_material: &[u8; 32]) -> Result<[u8; 32]> {
    hkdf_sha256(key_material, b"", HMAC_INFO, 32)?.to_key()
}

// ---------------------------------------------------------------------------
// MessageHeaderV2
// ---------------------------------------------------------------------------

/// v2 message header; observable by the network but authenticated as
/// AEAD associated data.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaderV2 {
    /// Sender-specified creation time, nanoseconds since the epoch.
    pub created_ns: u64,
    /// The conversation topic the message belongs to.
    pub topic: String,
    /// The sender's v2 bundle.
    pub sender: SignedPublicKeyBundle,
    /// Identifier of the message this one replies to, if any.
    pub parent_message_id: Option<String>,
}

// ---------------------------------------------------------------------------
// MessageV2
// ---------------------------------------------------------------------------

/// A sealed v2 message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageV2 {
    /// Encoded [`MessageHeaderV2`], used verbatim as AAD.
    pub header_bytes: Vec<u8>,
    /// Sealed payload (an encoded content record).
    pub ciphertext: Ciphertext,
    /// `HMAC-SHA256(derive(key_material, "hmac"), header_bytes)`.
    pub sender_hmac: Vec<u8>,
    /// Whether delivery should trigger a push notification.
    pub should_push: bool,
}

impl MessageV2 {
    /// Seals `payload` on `topic` with the session's key material.
    #[allow(clippy::too_many_arguments)]
    pub fn seal(
        own: &PrivateKeyBundle,
        key_material: &[u8; 32],
        topic: &str,
        payload: &[u8],
        created_ns: u64,
        parent_message_id: Option<String>,
        should_push: bool,
    ) -> Result<Self> {
        let header = MessageHeaderV2 {
            created_ns,
            topic: topic.to_string(),
            sender: own.public_bundle()?,
            parent_message_id,
        };
        let header_bytes = wire::encode(&header)?;

        let ciphertext = aead::seal(key_material, payload, &header_bytes)?;
        let sender_hmac = hmac_sha256(&hmac_key(key_material)?, &header_bytes)?.to_vec();

        Ok(Self {
            header_bytes,
            ciphertext,
            sender_hmac,
            should_push,
        })
    }

    /// Decodes the header.
    pub fn header(&self) -> Result<MessageHeaderV2> {
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
        Ok(Timestamp::from_ns(self.header()?.created_ns))
    }

    /// Opens the message with the session's key material.
    ///
    /// Verifies the sender bundle chain and the sender HMAC before
    /// decrypting.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] uniformly on any verification
    /// or decryption failure.
    pub fn open(&self, key_material: &[u8; 32]) -> Result<Vec<u8>> {
        let header: MessageHeaderV2 =
            wire::decode(&self.header_bytes).map_err(|_| DriftchatError::AuthFailure)?;
        header.sender.verify()?;

        verify_hmac_sha256(&hmac_key(key_material)?, &self.header_bytes, &self.sender_hmac)?;

        aead::open(key_material, &self.ciphertext, &self.header_bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use driftchat_crypto::wallet::{LocalWallet, WalletSigner};

    fn participant(fill: u8) -> (LocalWallet, PrivateKeyBundle) {
        let mut seed = [0u8; 32];
        seed[31] = fill;
        let wallet = LocalWallet::from_bytes(&seed).expect("valid scalar");
        let bundle = PrivateKeyBundle::generate(&wallet).expect("bundle generation");
        (wallet, bundle)
    }

    const TOPIC: &str = "/xmtp/0/m-test/proto";

    #[test]
    fn seal_open_roundtrip() -> Result<()> {
        let (wallet, alice) = participant(0x81);
        let key_material = [0x0au8; 32];

        let message = MessageV2::seal(&alice, &key_material, TOPIC, b"hi", 7, None, true)?;

        assert_eq!(message.open(&key_material)?, b"hi");
        assert_eq!(message.sender_address()?, wallet.address());
        assert_eq!(message.timestamp()?.as_ns(), 7);
        assert!(message.should_push);
        Ok(())
    }

    #[test]
    fn wrong_key_material_rejected() -> Result<()> {
        let (_, alice) = participant(0x82);
        let message = MessageV2::seal(&alice, &[0x0au8; 32], TOPIC, b"hi", 1, None, false)?;
        assert!(matches!(
            message.open(&[0x0bu8; 32]),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn tampered_hmac_rejected() -> Result<()> {
        let (_, alice) = participant(0x83);
        let key_material = [0x0cu8; 32];
        let mut message = MessageV2::seal(&alice, &key_material, TOPIC, b"hi", 1, None, false)?;
        message.sender_hmac[0] ^= 0x01;
        assert!(matches!(
            message.open(&key_material),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_rejected() -> Result<()> {
        let (_, alice) = participant(0x84);
        let key_material = [0x0du8; 32];
        let mut message = MessageV2::seal(&alice, &key_material, TOPIC, b"hi", 1, None, false)?;
        message.ciphertext.payload[0] ^= 0x01;
        assert!(matches!(
            message.open(&key_material),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn parent_message_id_survives() -> Result<()> {
        let (_, alice) = participant(0x85);
        let key_material = [0x0eu8; 32];
        let message = MessageV2::seal(
            &alice,
            &key_material,
            TOPIC,
            b"reply",
            1,
            Some("abc123".into()),
            false,
        )?;
        assert_eq!(message.header()?.parent_message_id.as_deref(), Some("abc123"));
        Ok(())
    }
}
