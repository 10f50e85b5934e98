//! Pub/sub topic grammar.
//!
//! Every channel name has the shape `/xmtp/0/<kind>-<qualifier>/proto`.
//! Kinds used by the core:
//!
//! - `dm` — direct-message v1; qualifier is the sorted pair of
//!   checksummed addresses joined by `-`.
//! - `intro` / `invite` — per-address bootstrap channels.
//! - `contact` — per-address contact bundle publication.
//! - `m` — v2 conversations with a derived or random qualifier.

use driftchat_types::Address;
use rand::rngs::OsRng;
use rand::RngCore;

/// Leading path segment of every topic.
pub const TOPIC_PREFIX: &str = "/xmtp/0/";

/// Trailing path segment of every topic.
pub const TOPIC_SUFFIX: &str = "/proto";

// ---------------------------------------------------------------------------
// TopicKind
// ---------------------------------------------------------------------------

/// Classification of a well-formed topic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopicKind {
    /// `dm-<addrA>-<addrB>` — direct-message v1 channel.
    DirectMessage,
    /// `intro-<addr>` — introduction channel.
    Intro,
    /// `invite-<addr>` — invitation channel.
    Invite,
    /// `contact-<addr>` — contact bundle channel.
    Contact,
    /// `m-<opaque>` — v2 conversation channel.
    Conversation,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn build(body: &str) -> String {
    format!("{TOPIC_PREFIX}{body}{TOPIC_SUFFIX}")
}

/// Builds the direct-message topic for an address pair.
///
/// The two rendered addresses are joined in ascending lexicographic
/// order, so both participants derive the same channel name.
pub fn direct_message(a: &Address, b: &Address) -> String {
    let a = a.to_checksum_string();
    let b = b.to_checksum_string();
    if a < b {
        build(&format!("dm-{a}-{b}"))
    } else {
        build(&format!("dm-{b}-{a}"))
    }
}

/// Builds the introduction topic for an address.
pub fn intro(address: &Address) -> String {
    build(&format!("intro-{address}"))
}

/// Builds the invitation topic for an address.
pub fn invite(address: &Address) -> String {
    build(&format!("invite-{address}"))
}

/// Builds the contact bundle topic for an address.
pub fn contact(address: &Address) -> String {
    build(&format!("contact-{address}"))
}

/// Builds a v2 conversation topic from an opaque qualifier.
pub fn conversation(qualifier: &str) -> String {
    build(&format!("m-{qualifier}"))
}

/// Builds a v2 conversation topic with a random 16-byte hex qualifier.
pub fn random_conversation() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    conversation(&hex::encode(bytes))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies a topic, returning `None` when it is malformed.
pub fn kind(topic: &str) -> Option<TopicKind> {
    let body = topic
        .strip_prefix(TOPIC_PREFIX)?
        .strip_suffix(TOPIC_SUFFIX)?;
    if body.is_empty() {
        return None;
    }

    let (prefix, qualifier) = body.split_once('-')?;
    if qualifier.is_empty() {
        return None;
    }

    match prefix {
        "dm" => Some(TopicKind::DirectMessage),
        "intro" => Some(TopicKind::Intro),
        "invite" => Some(TopicKind::Invite),
        "contact" => Some(TopicKind::Contact),
        "m" => Some(TopicKind::Conversation),
        _ => None,
    }
}

/// Returns `true` when the topic matches the grammar.
pub fn is_well_formed(topic: &str) -> bool {
    kind(topic).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
