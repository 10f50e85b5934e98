//! Cryptographic primitives for the Driftchat messaging core.
//!
//! All symmetric encryption uses AES-256-GCM with a per-message
//! HKDF-SHA256-derived key; key agreement is ECDH on secp256k1; signing
//! is recoverable ECDSA over keccak-256 digests, matching the wallet
//! account model.
//!
//! # Modules
//!
//! - [`aead`] — `seal`/`open` and the [`aead::Ciphertext`] wire shape
//! - [`ecdh`] — secp256k1 key agreement (X-coordinate shared secret)
//! - [`hash`] — keccak-256 and SHA-256
//! - [`hkdf`] — HKDF-SHA256 derivation (RFC 5869)
//! - [`keys`] — secp256k1 keypair and public key wrappers
//! - [`mac`] — HMAC-SHA256 computation and verification
//! - [`signing`] — recoverable ECDSA, address recovery, EIP-191 digests
//! - [`wallet`] — the external wallet-signer seam

pub mod aead;
pub mod ecdh;
pub mod hash;
pub mod hkdf;
pub mod keys;
pub mod mac;
pub mod signing;
pub mod wallet;

pub(crate) mod ser;
