//! Recoverable ECDSA signing over keccak-256 digests.
//!
//! Wallet accounts sign with recoverable ECDSA so the verifier can
//! recover the signer's public key (and thus wallet address) from the
//! signature itself. Identity-key signatures over pre-keys use the
//! same machinery with direct digest verification.

use driftchat_types::{Address, DriftchatError, Result};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

use crate::hash::keccak256;
use crate::keys::{Keypair, PublicKey, Signature};

/// Signs a 32-byte digest, producing a recoverable signature.
///
/// # Errors
///
/// Returns [`DriftchatError::Invariant`] if signing fails (should not
/// happen with a valid keypair).
pub fn sign_digest(keypair: &Keypair, digest: &[u8; 32]) -> Result<Signature> {
    let (sig, recovery_id) = keypair
        .signing()
        .sign_prehash_recoverable(digest)
        .map_err(|e| DriftchatError::Invariant {
            reason: format!("ECDSA signing failed: {e}"),
        })?;

    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&sig.to_bytes());
    Ok(Signature::new(bytes, recovery_id.to_byte()))
}

/// Verifies a signature over a 32-byte digest against a known public key.
///
/// # Errors
///
/// Returns [`DriftchatError::AuthFailure`] on any mismatch.
pub fn verify_digest(public: &PublicKey, digest: &[u8; 32], signature: &Signature) -> Result<()> {
    let verifying = VerifyingKey::from_sec1_bytes(public.as_bytes())
        .map_err(|_| DriftchatError::AuthFailure)?;
    let sig =
        EcdsaSignature::from_slice(signature.as_bytes()).map_err(|_| DriftchatError::AuthFailure)?;

    verifying
        .verify_prehash(digest, &sig)
        .map_err(|_| DriftchatError::AuthFailure)
}

/// Recovers the signing public key from a signature over `digest`.
///
/// # Errors
///
/// Returns [`DriftchatError::AuthFailure`] if recovery fails.
pub fn recover_public_key(digest: &[u8; 32], signature: &Signature) -> Result<PublicKey> {
    let sig =
        EcdsaSignature::from_slice(signature.as_bytes()).map_err(|_| DriftchatError::AuthFailure)?;
    let recovery_id =
        RecoveryId::from_byte(signature.recovery_id()).ok_or(DriftchatError::AuthFailure)?;

    let verifying = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| DriftchatError::AuthFailure)?;

    let point = verifying.to_encoded_point(false);
    let mut bytes = [0u8; 65];
    bytes.copy_from_slice(point.as_bytes());
    PublicKey::from_bytes(bytes)
}

/// Recovers the wallet address that produced a signature over `digest`.
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address> {
    Ok(public_key_to_address(&recover_public_key(digest, signature)?))
}

/// Derives the wallet address for a public key.
///
/// Address = last 20 bytes of `keccak256(X || Y)`.
pub fn public_key_to_address(public: &PublicKey) -> Address {
    let digest = keccak256(public.coordinates());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

/// Computes the EIP-191 "personal message" digest.
///
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`
/// — the digest wallet UIs present for signing.
pub fn personal_digest(message: &[u8]) -> [u8; 32] {
    let mut preimage =
        Vec::with_capacity(26 + 20 + message.len());
    preimage.extend_from_slice(b"\x19Ethereum Signed Message:\n");
    preimage.extend_from_slice(message.len().to_string().as_bytes());
    preimage.extend_from_slice(message);
    keccak256(&preimage)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
