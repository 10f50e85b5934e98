//! The relay's atomic unit of exchange.
//!
//! An envelope pairs an opaque payload with the topic it was published
//! on and the relay-assigned nanosecond timestamp. The core never
//! trusts envelope contents until the matching session unseals them.

use driftchat_types::Timestamp;
use serde::{Deserialize, Serialize};

/// A single unit exchanged with the relay.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The pub/sub topic this envelope belongs to.
    pub content_topic: String,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Opaque payload bytes (a CBOR-encoded protocol record).
    pub message: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope for `topic` carrying `message`.
    pub fn new(topic: impl Into<String>, timestamp: Timestamp, message: Vec<u8>) -> Self {
        Self {
            content_topic: topic.into(),
            timestamp_ns: timestamp.as_ns(),
            message,
        }
    }

    /// The envelope timestamp as a [`Timestamp`].
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_ns(self.timestamp_ns)
    }
}
