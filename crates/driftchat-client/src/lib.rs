//! Participant runtime for the Driftchat messaging core.
//!
//! A [`client::Client`] owns a participant's keys and collaborator
//! handles (relay, contact directory, codec registry). Its
//! [`conversations::Conversations`] registry discovers, creates, and
//! enumerates per-peer sessions, and streams incoming traffic across
//! all of them.
//!
//! # Modules
//!
//! - [`client`] — participant facade and builder
//! - [`contacts`] — contact directory contract
//! - [`conversation`] — per-session send/receive (v1 and v2)
//! - [`conversations`] — the topic → session registry
//! - [`message`] — decrypted and decoded message shapes
//! - [`relay`] — relay client contract
//! - [`streams`] — conversation and message streaming

pub mod client;
pub mod contacts;
pub mod conversation;
pub mod conversations;
pub mod message;
pub mod relay;
pub mod streams;
