//! v2 session bootstrap: invitations and their sealed carrier.
//!
//! An invitation names the conversation topic and the 32-byte session
//! key material. In deterministic mode both peers derive bitwise
//! identical parameters from their pre-keys and the conversation
//! context, so either side can open the session without waiting for
//! the other. Explicit mode draws both from OS entropy when the sender
//! wants a session distinct from any derivable one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use driftchat_crypto::aead::{self, Ciphertext};
use driftchat_crypto::hkdf::hkdf_sha256;
use driftchat_crypto::mac::hmac_sha256;
use driftchat_types::{Address, ConversationContext, DriftchatError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::keys::{PrivateKeyBundle, SignedPublicKeyBundle};
use crate::topic;
use crate::wire;

/// HKDF info string for deriving session key material.
const KEY_MATERIAL_INFO: &[u8] = b"xmtp/v2/keyMaterial";

/// Length of session key material in bytes.
pub const KEY_MATERIAL_LEN: usize = 32;

// ---------------------------------------------------------------------------
// InvitationV1
// ---------------------------------------------------------------------------

/// An unsealed invitation: the shared secret of a v2 session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InvitationV1 {
    /// Conversation topic chosen for this session.
    pub topic: String,
    /// Application context; its `conversation_id` participates in
    /// deterministic derivation.
    pub context: Option<ConversationContext>,
    /// 32 bytes of AES-256-GCM-HKDF-SHA256 key material.
    pub key_material: Vec<u8>,
}

impl InvitationV1 {
    /// Derives the deterministic invitation for a peer and context.
    ///
    /// Both peers, holding the same two bundles and context, produce
    /// bitwise identical `topic` and `key_material`:
    ///
    /// ```text
    /// k          = ECDH(own.pre_key, peer.pre_key)
    /// msg        = "0" || context.conversation_id      (or just "0")
    /// topic_seed = HMAC-SHA256(k, msg)
    /// topic      = /xmtp/0/m-<base64url(topic_seed)>/proto
    /// key        = HKDF-SHA256(k, salt=topic_seed,
    ///                          info="xmtp/v2/keyMaterial", L=32)
    /// ```
    pub fn deterministic(
        own: &PrivateKeyBundle,
        peer: &SignedPublicKeyBundle,
        context: Option<ConversationContext>,
    ) -> Result<Self> {
        let secret = own.invitation_secret(&peer.pre_key.public_key()?)?;

        let mut msg = b"0".to_vec();
        if let Some(ctx) = &context {
            msg.extend_from_slice(ctx.conversation_id.as_bytes());
        }
        let topic_seed = hmac_sha256(&secret, &msg)?;

        let topic = topic::conversation(&URL_SAFE_NO_PAD.encode(topic_seed));
        let key_material = hkdf_sha256(&secret, &topic_seed, KEY_MATERIAL_INFO, KEY_MATERIAL_LEN)?
            .as_bytes()
            .to_vec();

        Ok(Self {
            topic,
            context,
            key_material,
        })
    }

    /// Builds an explicit invitation with a random topic and random
    /// key material.
    pub fn random(context: Option<ConversationContext>) -> Self {
        let mut key_material = vec![0u8; KEY_MATERIAL_LEN];
        OsRng.fill_bytes(&mut key_material);
        Self {
            topic: topic::random_conversation(),
            context,
            key_material,
        }
    }

    /// Returns the key material as a fixed 32-byte array.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::Protocol`] if the invitation carries the
    /// wrong amount of material.
    pub fn key(&self) -> Result<[u8; 32]> {
        if self.key_material.len() != KEY_MATERIAL_LEN {
            return Err(DriftchatError::Protocol {
                reason: format!(
                    "expected {KEY_MATERIAL_LEN} bytes of key material, got {}",
                    self.key_material.len()
                ),
            });
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.key_material);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// SealedInvitationHeaderV1
// ---------------------------------------------------------------------------

/// Unencrypted invitation header, authenticated as AEAD AAD.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SealedInvitationHeaderV1 {
    /// The sender's v2 bundle.
    pub sender: SignedPublicKeyBundle,
    /// The recipient's v2 bundle.
    pub recipient: SignedPublicKeyBundle,
    /// Creation time, nanoseconds since the epoch.
    pub created_ns: u64,
}

// ---------------------------------------------------------------------------
// SealedInvitationV1
// ---------------------------------------------------------------------------

/// An invitation sealed under the prekey-prekey secret of the two
/// bundles named in its header.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SealedInvitationV1 {
    /// Encoded [`SealedInvitationHeaderV1`], used verbatim as AAD.
    pub header_bytes: Vec<u8>,
    /// Sealed [`InvitationV1`].
    pub ciphertext: Ciphertext,
}

impl SealedInvitationV1 {
    /// Seals `invitation` from `own` to `recipient`.
    pub fn seal(
        own: &PrivateKeyBundle,
        recipient: &SignedPublicKeyBundle,
        invitation: &InvitationV1,
        created_ns: u64,
    ) -> Result<Self> {
        let header = SealedInvitationHeaderV1 {
            sender: own.public_bundle()?,
            recipient: recipient.clone(),
            created_ns,
        };
        let header_bytes = wire::encode(&header)?;

        let secret = own.invitation_secret(&recipient.pre_key.public_key()?)?;
        let ciphertext = aead::seal(&secret, &wire::encode(invitation)?, &header_bytes)?;

        Ok(Self {
            header_bytes,
            ciphertext,
        })
    }

    /// Decodes the header.
    pub fn header(&self) -> Result<SealedInvitationHeaderV1> {
        wire::decode(&self.header_bytes)
    }

    /// Opens the invitation as either party named in the header.
    ///
    /// The sender side of the header must carry a valid
    /// wallet → identity → pre-key chain; the local participant must
    /// be the named sender or recipient and must still hold the
    /// pre-key the header names for it.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] uniformly on any verification
    /// or decryption failure.
    pub fn open(&self, own: &PrivateKeyBundle) -> Result<InvitationV1> {
        let header: SealedInvitationHeaderV1 =
            wire::decode(&self.header_bytes).map_err(|_| DriftchatError::AuthFailure)?;

        let sender_wallet = header.sender.verify()?;
        // Recipient routing only needs the identity recovery; the
        // recipient bundle is the local participant's own published
        // material.
        let recipient_wallet = header.recipient.identity_key.recover_wallet()?;

        let own_address = own.wallet_address();
        let (my_pre_key, peer_pre_key) = if recipient_wallet == own_address {
            (
                header.recipient.pre_key.public_key()?,
                header.sender.pre_key.public_key()?,
            )
        } else if sender_wallet == own_address {
            (
                header.sender.pre_key.public_key()?,
                header.recipient.pre_key.public_key()?,
            )
        } else {
            return Err(DriftchatError::AuthFailure);
        };

        let secret = own.invitation_secret_with(&my_pre_key, &peer_pre_key)?;
        let payload = aead::open(&secret, &self.ciphertext, &self.header_bytes)?;
        wire::decode(&payload).map_err(|_| DriftchatError::AuthFailure)
    }

    /// The wallet address of the counterparty, from `own`'s viewpoint.
    pub fn peer_address(&self, own_address: &Address) -> Result<Address> {
        let header = self.header()?;
        let sender = header.sender.identity_key.recover_wallet()?;
        if sender == *own_address {
            header.recipient.identity_key.recover_wallet()
        } else {
            Ok(sender)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use driftchat_crypto::wallet::LocalWallet;

    fn participant(fill: u8) -> PrivateKeyBundle {
        let mut seed = [0u8; 32];
        seed[31] = fill;
        let wallet = LocalWallet::from_bytes(&seed).expect("valid scalar");
        PrivateKeyBundle::generate(&wallet).expect("bundle generation")
    }

    #[test]
    fn deterministic_identical_from_both_sides() -> Result<()> {
        let alice = participant(0x71);
        let bob = participant(0x72);
        let context = Some(ConversationContext::new("example.com/x"));

        let from_alice =
            InvitationV1::deterministic(&alice, &bob.public_bundle()?, context.clone())?;
        let from_bob = InvitationV1::deterministic(&bob, &alice.public_bundle()?, context)?;

        assert_eq!(from_alice.topic, from_bob.topic);
        assert_eq!(from_alice.key_material, from_bob.key_material);
        assert_eq!(from_alice.key_material.len(), KEY_MATERIAL_LEN);
        assert!(topic::is_well_formed(&from_alice.topic));
        Ok(())
    }

    #[test]
    fn distinct_contexts_distinct_sessions() -> Result<()> {
        let alice = participant(0x73);
        let bob = participant(0x74);

        let plain = InvitationV1::deterministic(&alice, &bob.public_bundle()?, None)?;
        let ctx_a = InvitationV1::deterministic(
            &alice,
            &bob.public_bundle()?,
            Some(ConversationContext::new("a")),
        )?;
        let ctx_b = InvitationV1::deterministic(
            &alice,
            &bob.public_bundle()?,
            Some(ConversationContext::new("b")),
        )?;

        assert_ne!(plain.topic, ctx_a.topic);
        assert_ne!(ctx_a.topic, ctx_b.topic);
        assert_ne!(ctx_a.key_material, ctx_b.key_material);
        Ok(())
    }

    #[test]
    fn random_invitations_are_unique() {
        let a = InvitationV1::random(None);
        let b = InvitationV1::random(None);
        assert_ne!(a.topic, b.topic);
        assert_ne!(a.key_material, b.key_material);
    }

    #[test]
    fn sealed_roundtrip_both_parties() -> Result<()> {
        let alice = participant(0x75);
        let bob = participant(0x76);

        let invitation = InvitationV1::deterministic(&alice, &bob.public_bundle()?, None)?;
        let sealed = SealedInvitationV1::seal(&alice, &bob.public_bundle()?, &invitation, 42)?;

        // The recipient opens it; so can the sender (own invite channel).
        assert_eq!(sealed.open(&bob)?, invitation);
        assert_eq!(sealed.open(&alice)?, invitation);
        assert_eq!(sealed.header()?.created_ns, 42);
        Ok(())
    }

    #[test]
    fn third_party_cannot_open() -> Result<()> {
        let alice = participant(0x77);
        let bob = participant(0x78);
        let carol = participant(0x79);

        let invitation = InvitationV1::random(None);
        let sealed = SealedInvitationV1::seal(&alice, &bob.public_bundle()?, &invitation, 1)?;
        assert!(matches!(
            sealed.open(&carol),
            Err(DriftchatError::AuthFailure)
        ));
        Ok(())
    }

    #[test]
    fn tampered_header_rejected() -> Result<()> {
        let alice = participant(0x7a);
        let bob = participant(0x7b);

        let invitation = InvitationV1::random(None);
        let mut sealed = SealedInvitationV1::seal(&alice, &bob.public_bundle()?, &invitation, 1)?;
        let last = sealed.header_bytes.len() - 1;
        sealed.header_bytes[last] ^= 0x01;
        assert!(sealed.open(&bob).is_err());
        Ok(())
    }

    #[test]
    fn peer_address_is_viewpoint_dependent() -> Result<()> {
        let alice = participant(0x7c);
        let bob = participant(0x7d);

        let invitation = InvitationV1::random(None);
        let sealed = SealedInvitationV1::seal(&alice, &bob.public_bundle()?, &invitation, 1)?;

        assert_eq!(
            sealed.peer_address(&alice.wallet_address())?,
            bob.wallet_address()
        );
        assert_eq!(
            sealed.peer_address(&bob.wallet_address())?,
            alice.wallet_address()
        );
        Ok(())
    }
}
