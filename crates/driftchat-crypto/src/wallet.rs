//! Wallet signer seam.
//!
//! Binding an identity key to a wallet requires a signature from the
//! account owner. Interactive signing (hardware wallets, browser
//! extensions) lives outside this workspace; the core only depends on
//! the [`WalletSigner`] trait. [`LocalWallet`] is the in-process
//! implementation used for key generation and tests.

use driftchat_types::{Address, Result};

use crate::keys::{Keypair, Signature};
use crate::signing::{personal_digest, public_key_to_address, sign_digest};

// ---------------------------------------------------------------------------
// WalletSigner
// ---------------------------------------------------------------------------

/// An account capable of producing EIP-191 personal-message signatures.
pub trait WalletSigner: Send + Sync {
    /// The wallet address of this signer.
    fn address(&self) -> Address;

    /// Signs `message` as a personal message (EIP-191 prefix applied).
    fn sign_personal(&self, message: &[u8]) -> Result<Signature>;
}

// ---------------------------------------------------------------------------
// LocalWallet
// ---------------------------------------------------------------------------

/// In-process wallet backed by a raw secp256k1 keypair.
pub struct LocalWallet {
    keypair: Keypair,
}

impl LocalWallet {
    /// Generates a wallet with a fresh random key.
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Creates a wallet from a raw 32-byte private scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            keypair: Keypair::from_bytes(bytes)?,
        })
    }
}

impl WalletSigner for LocalWallet {
    fn address(&self) -> Address {
        public_key_to_address(&self.keypair.public_key())
    }

    fn sign_personal(&self, message: &[u8]) -> Result<Signature> {
        sign_digest(&self.keypair, &personal_digest(message))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::recover_address;

    #[test]
    fn personal_signature_recovers_to_wallet() -> Result<()> {
        let mut seed = [0u8; 32];
        seed[31] = 0x55;
        let wallet = LocalWallet::from_bytes(&seed)?;

        let sig = wallet.sign_personal(b"hello")?;
        let recovered = recover_address(&personal_digest(b"hello"), &sig)?;
        assert_eq!(recovered, wallet.address());
        Ok(())
    }
}
