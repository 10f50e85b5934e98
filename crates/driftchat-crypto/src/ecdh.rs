//! secp256k1 Elliptic-Curve Diffie-Hellman key agreement.
//!
//! The shared secret is the X coordinate of the scalar product, 32
//! bytes. Message-level secrets concatenate several of these (see the
//! key-bundle layer); invitation secrets use a single agreement.

use driftchat_types::{DriftchatError, Result};

use crate::keys::{Keypair, PublicKey};

/// Computes the ECDH shared secret between a private key and a peer
/// public key.
///
/// Returns the 32-byte X coordinate of the shared point. Symmetric:
/// `shared_secret(a, B) == shared_secret(b, A)`.
///
/// # Errors
///
/// Returns [`DriftchatError::AuthFailure`] if the peer key does not
/// decode to a curve point; a malformed key in received material is
/// treated like any other verification failure.
pub fn shared_secret(keypair: &Keypair, public: &PublicKey) -> Result<[u8; 32]> {
    let point = k256::PublicKey::from_sec1_bytes(public.as_bytes())
        .map_err(|_| DriftchatError::AuthFailure)?;

    let shared = k256::ecdh::diffie_hellman(keypair.signing().as_nonzero_scalar(), point.as_affine());

    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
