//! Wire protocol for the Driftchat messaging core.
//!
//! Defines the envelope and topic grammar shared with the relay
//! network, the key-bundle model binding wallets to identity and
//! pre-keys, both message generations (v1 direct-addressed, v2
//! invitation-based), sealed invitations with deterministic session
//! derivation, and the pluggable content-codec layer.
//!
//! # Modules
//!
//! - [`canonical`] — deterministic CBOR encoding of signed key material
//! - [`codec`] — content-type identifiers, codecs, and the registry
//! - [`compression`] — deflate/gzip handling for encoded content
//! - [`envelope`] — the relay's atomic unit
//! - [`invitation`] — `InvitationV1` and `SealedInvitationV1`
//! - [`keys`] — public/private key bundles, v1 and v2
//! - [`message_v1`] — direct-addressed sealed messages
//! - [`message_v2`] — session-key sealed messages
//! - [`topic`] — the pub/sub topic grammar
//! - [`wire`] — length-delimited CBOR record encoding

pub mod canonical;
pub mod codec;
pub mod compression;
pub mod envelope;
pub mod invitation;
pub mod keys;
pub mod message_v1;
pub mod message_v2;
pub mod topic;
pub mod wire;
