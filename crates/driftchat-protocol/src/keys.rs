//! Key bundles binding wallets to identity keys and pre-keys.
//!
//! The trust chain is wallet → identity key → pre-key:
//!
//! - the **identity key** is long-lived and carries an EIP-191 wallet
//!   signature over a "Create Identity" message embedding the key;
//! - the **pre-key** is ephemeral, signed by the identity key, and is
//!   the participant-side input to ECDH; it may be rotated.
//!
//! Public bundles travel in two generations: v1 carries raw keys with
//! attached signatures, v2 wraps each key as a signed public key whose
//! canonical bytes are carried verbatim. Signatures verify before a
//! bundle is accepted anywhere in the core.

use driftchat_crypto::ecdh;
use driftchat_crypto::hash::keccak256;
use driftchat_crypto::keys::{Keypair, PublicKey, Signature};
use driftchat_crypto::signing::{personal_digest, recover_address, sign_digest, verify_digest};
use driftchat_crypto::wallet::WalletSigner;
use driftchat_types::{Address, DriftchatError, Result, Signable, Timestamp};
use serde::{Deserialize, Serialize};

use crate::canonical::{unsigned_key_from_cbor, unsigned_key_to_cbor};

/// Renders the "Create Identity" message a wallet signs to bind an
/// identity key. Wallet UIs display this text verbatim.
pub fn create_identity_message(key_bytes: &[u8]) -> Vec<u8> {
    format!(
        "XMTP : Create Identity\n{}\n\nFor more info: https://xmtp.org/signatures/",
        hex::encode(key_bytes)
    )
    .into_bytes()
}

// ---------------------------------------------------------------------------
// UnsignedPublicKey
// ---------------------------------------------------------------------------

/// A public key plus its creation time, before any signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsignedPublicKey {
    /// Creation time in nanoseconds since the epoch.
    pub created_ns: u64,
    /// The secp256k1 public key.
    pub public_key: PublicKey,
}

impl Signable for UnsignedPublicKey {
    fn signable_bytes(&self) -> Result<Vec<u8>> {
        unsigned_key_to_cbor(self.created_ns, &self.public_key)
    }
}

// ---------------------------------------------------------------------------
// SignedPublicKey (v2)
// ---------------------------------------------------------------------------

/// v2 signed public key: canonical key bytes plus the signature over
/// them.
///
/// `key_bytes` is carried verbatim so verification operates on exactly
/// the bytes that were signed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignedPublicKey {
    /// Canonical CBOR encoding of the unsigned key.
    pub key_bytes: Vec<u8>,
    /// Signature over `key_bytes`. Identity keys carry a wallet
    /// (EIP-191) signature; pre-keys an identity-key signature over
    /// `keccak256(key_bytes)`.
    pub signature: Signature,
}

impl SignedPublicKey {
    /// Decodes the embedded unsigned key.
    pub fn unsigned(&self) -> Result<UnsignedPublicKey> {
        let (created_ns, public_key) = unsigned_key_from_cbor(&self.key_bytes)?;
        Ok(UnsignedPublicKey {
            created_ns,
            public_key,
        })
    }

    /// Decodes just the public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(self.unsigned()?.public_key)
    }

    /// Recovers the wallet address from an identity-key wallet
    /// signature.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] if recovery fails.
    pub fn recover_wallet(&self) -> Result<Address> {
        let message = create_identity_message(&self.key_bytes);
        recover_address(&personal_digest(&message), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// PublicKeyV1 (legacy)
// ---------------------------------------------------------------------------

/// v1 public key: raw key and creation time with an attached signature.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyV1 {
    /// Creation time in nanoseconds since the epoch.
    pub timestamp_ns: u64,
    /// The secp256k1 public key.
    pub public_key: PublicKey,
    /// Wallet signature (identity keys) or identity signature
    /// (pre-keys). Absent only on freshly constructed, not yet
    /// published keys.
    pub signature: Option<Signature>,
}

impl Signable for PublicKeyV1 {
    fn signable_bytes(&self) -> Result<Vec<u8>> {
        unsigned_key_to_cbor(self.timestamp_ns, &self.public_key)
    }
}

impl PublicKeyV1 {
    fn signature(&self) -> Result<&Signature> {
        self.signature.as_ref().ok_or(DriftchatError::AuthFailure)
    }

    /// Converts to the v2 signed form.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] if the key carries no signature.
    pub fn to_signed(&self) -> Result<SignedPublicKey> {
        Ok(SignedPublicKey {
            key_bytes: self.signable_bytes()?,
            signature: *self.signature()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Public bundles
// ---------------------------------------------------------------------------

/// v1 public key bundle: raw keys with attached signatures.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    /// Identity key, wallet-signed.
    pub identity_key: PublicKeyV1,
    /// Current pre-key, identity-signed.
    pub pre_key: PublicKeyV1,
}

impl PublicKeyBundle {
    /// Verifies the wallet → identity → pre-key signature chain and
    /// returns the wallet address.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] on any broken link.
    pub fn verify(&self) -> Result<Address> {
        let identity_bytes = self.identity_key.signable_bytes()?;
        let wallet = recover_address(
            &personal_digest(&create_identity_message(&identity_bytes)),
            self.identity_key.signature()?,
        )?;

        let pre_bytes = self.pre_key.signable_bytes()?;
        verify_digest(
            &self.identity_key.public_key,
            &keccak256(&pre_bytes),
            self.pre_key.signature()?,
        )?;

        Ok(wallet)
    }

    /// Converts to the v2 signed form.
    pub fn to_signed(&self) -> Result<SignedPublicKeyBundle> {
        Ok(SignedPublicKeyBundle {
            identity_key: self.identity_key.to_signed()?,
            pre_key: self.pre_key.to_signed()?,
        })
    }
}

/// v2 public key bundle of signed public keys.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignedPublicKeyBundle {
    /// Identity key, wallet-signed.
    pub identity_key: SignedPublicKey,
    /// Current pre-key, identity-signed.
    pub pre_key: SignedPublicKey,
}

impl SignedPublicKeyBundle {
    /// Verifies the wallet → identity → pre-key signature chain and
    /// returns the wallet address.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] on any broken link.
    pub fn verify(&self) -> Result<Address> {
        let wallet = self.identity_key.recover_wallet()?;

        let identity_public = self.identity_key.public_key()?;
        verify_digest(
            &identity_public,
            &keccak256(&self.pre_key.key_bytes),
            &self.pre_key.signature,
        )?;

        Ok(wallet)
    }

    /// Converts to the legacy v1 form.
    pub fn to_legacy(&self) -> Result<PublicKeyBundle> {
        let identity = self.identity_key.unsigned()?;
        let pre = self.pre_key.unsigned()?;
        Ok(PublicKeyBundle {
            identity_key: PublicKeyV1 {
                timestamp_ns: identity.created_ns,
                public_key: identity.public_key,
                signature: Some(self.identity_key.signature),
            },
            pre_key: PublicKeyV1 {
                timestamp_ns: pre.created_ns,
                public_key: pre.public_key,
                signature: Some(self.pre_key.signature),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// ContactBundle
// ---------------------------------------------------------------------------

/// Versioned contact bundle published on a participant's contact
/// channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContactBundle {
    /// Legacy bundle of raw signed keys.
    V1(PublicKeyBundle),
    /// Bundle of signed public keys.
    V2(SignedPublicKeyBundle),
}

impl ContactBundle {
    /// Verifies the signature chain and returns the wallet address.
    pub fn verify(&self) -> Result<Address> {
        match self {
            Self::V1(bundle) => bundle.verify(),
            Self::V2(bundle) => bundle.verify(),
        }
    }

    /// Returns the bundle in v2 form, converting if necessary.
    pub fn to_signed(&self) -> Result<SignedPublicKeyBundle> {
        match self {
            Self::V1(bundle) => bundle.to_signed(),
            Self::V2(bundle) => Ok(bundle.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A private key with its signed public half.
pub struct PrivateKey {
    created_ns: u64,
    keypair: Keypair,
    public: SignedPublicKey,
}

// PrivateKey does not implement Clone/Debug to prevent leakage.

impl PrivateKey {
    /// Creation time in nanoseconds since the epoch.
    pub fn created_ns(&self) -> u64 {
        self.created_ns
    }

    /// The private keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The signed public half.
    pub fn public(&self) -> &SignedPublicKey {
        &self.public
    }
}

// ---------------------------------------------------------------------------
// PrivateKeyBundle
// ---------------------------------------------------------------------------

/// The owning side of a participant's keys: identity private key and
/// all known pre-keys, newest first.
///
/// Sessions never hold this directly; they reference the participant
/// that owns it.
pub struct PrivateKeyBundle {
    wallet_address: Address,
    identity_key: PrivateKey,
    pre_keys: Vec<PrivateKey>,
}

impl PrivateKeyBundle {
    /// Generates a fresh bundle bound to `wallet` and signs the first
    /// pre-key.
    ///
    /// # Errors
    ///
    /// Propagates wallet-signing and encoding failures.
    pub fn generate(wallet: &dyn WalletSigner) -> Result<Self> {
        let created_ns = Timestamp::now().as_ns();

        let identity_keypair = Keypair::generate();
        let identity_bytes = UnsignedPublicKey {
            created_ns,
            public_key: identity_keypair.public_key(),
        }
        .signable_bytes()?;
        let identity_signature = wallet.sign_personal(&create_identity_message(&identity_bytes))?;

        let identity_key = PrivateKey {
            created_ns,
            public: SignedPublicKey {
                key_bytes: identity_bytes,
                signature: identity_signature,
            },
            keypair: identity_keypair,
        };

        let mut bundle = Self {
            wallet_address: wallet.address(),
            identity_key,
            pre_keys: Vec::new(),
        };
        bundle.rotate_pre_key()?;
        Ok(bundle)
    }

    /// The wallet address this bundle is bound to.
    pub fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    /// The identity private key.
    pub fn identity_key(&self) -> &PrivateKey {
        &self.identity_key
    }

    /// Generates a new pre-key signed by the identity key, making it
    /// current. Older pre-keys remain available for unsealing.
    pub fn rotate_pre_key(&mut self) -> Result<&SignedPublicKey> {
        let created_ns = Timestamp::now().as_ns();
        let keypair = Keypair::generate();
        let key_bytes = UnsignedPublicKey {
            created_ns,
            public_key: keypair.public_key(),
        }
        .signable_bytes()?;
        let signature = sign_digest(self.identity_key.keypair(), &keccak256(&key_bytes))?;

        self.pre_keys.insert(
            0,
            PrivateKey {
                created_ns,
                keypair,
                public: SignedPublicKey {
                    key_bytes,
                    signature,
                },
            },
        );
        Ok(self.pre_keys[0].public())
    }

    /// The current (newest) pre-key.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::Invariant`] if the bundle holds no pre-key.
    pub fn current_pre_key(&self) -> Result<&PrivateKey> {
        self.pre_keys.first().ok_or_else(|| DriftchatError::Invariant {
            reason: "private key bundle holds no pre-key".into(),
        })
    }

    /// Finds the pre-key whose public half matches `public`.
    pub fn find_pre_key(&self, public: &PublicKey) -> Option<&PrivateKey> {
        self.pre_keys
            .iter()
            .find(|pk| pk.keypair().public_key() == *public)
    }

    /// The published v2 public bundle.
    pub fn public_bundle(&self) -> Result<SignedPublicKeyBundle> {
        Ok(SignedPublicKeyBundle {
            identity_key: self.identity_key.public().clone(),
            pre_key: self.current_pre_key()?.public().clone(),
        })
    }

    /// The published v1 public bundle.
    pub fn legacy_bundle(&self) -> Result<PublicKeyBundle> {
        self.public_bundle()?.to_legacy()
    }

    /// Computes the combined message secret of the v1 scheme.
    ///
    /// Three X-coordinates are concatenated; sender and recipient pick
    /// mirrored halves so both arrive at the same 96 bytes:
    ///
    /// ```text
    /// sender:    DH(id_S, pre_R) || DH(pre_S, id_R) || DH(pre_S, pre_R)
    /// recipient: DH(pre_R, id_S) || DH(id_R, pre_S) || DH(pre_R, pre_S)
    /// ```
    ///
    /// # Parameters
    ///
    /// - `peer_identity`, `peer_pre_key` — the peer's public halves,
    ///   taken from a verified bundle or message header.
    /// - `my_pre_key` — which local pre-key to use (the header names it
    ///   on receive).
    /// - `is_recipient` — which side of the mirror we are on.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] if `my_pre_key` is not one of
    /// ours or an agreement fails.
    pub fn shared_secret(
        &self,
        peer_identity: &PublicKey,
        peer_pre_key: &PublicKey,
        my_pre_key: &PublicKey,
        is_recipient: bool,
    ) -> Result<Vec<u8>> {
        let pre_key = self
            .find_pre_key(my_pre_key)
            .ok_or(DriftchatError::AuthFailure)?;

        let (dh1, dh2) = if is_recipient {
            (
                ecdh::shared_secret(pre_key.keypair(), peer_identity)?,
                ecdh::shared_secret(self.identity_key.keypair(), peer_pre_key)?,
            )
        } else {
            (
                ecdh::shared_secret(self.identity_key.keypair(), peer_pre_key)?,
                ecdh::shared_secret(pre_key.keypair(), peer_identity)?,
            )
        };
        let dh3 = ecdh::shared_secret(pre_key.keypair(), peer_pre_key)?;

        let mut secret = Vec::with_capacity(96);
        secret.extend_from_slice(&dh1);
        secret.extend_from_slice(&dh2);
        secret.extend_from_slice(&dh3);
        Ok(secret)
    }

    /// Computes the single prekey-prekey secret used for invitations.
    ///
    /// Symmetric by construction, so both peers derive it without
    /// coordination.
    pub fn invitation_secret(&self, peer_pre_key: &PublicKey) -> Result<[u8; 32]> {
        ecdh::shared_secret(self.current_pre_key()?.keypair(), peer_pre_key)
    }

    /// Like [`Self::invitation_secret`], but with an explicit local
    /// pre-key (used when unsealing against a rotated key).
    pub fn invitation_secret_with(
        &self,
        my_pre_key: &PublicKey,
        peer_pre_key: &PublicKey,
    ) -> Result<[u8; 32]> {
        let pre_key = self
            .find_pre_key(my_pre_key)
            .ok_or(DriftchatError::AuthFailure)?;
        ecdh::shared_secret(pre_key.keypair(), peer_pre_key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
