//! Per-session send/receive.
//!
//! The two session generations share one operation surface but differ
//! in state and algorithm: v1 derives a fresh combined secret per
//! message from the peer's published bundle, v2 reuses the session's
//! key material. Dispatch happens on the [`Conversation`] tagged
//! union; there is no inheritance.

use std::sync::Arc;

use driftchat_protocol::codec::{ContentCodec, TextCodec};
use driftchat_protocol::compression;
use driftchat_protocol::envelope::Envelope;
use driftchat_protocol::invitation::InvitationV1;
use driftchat_protocol::keys::ContactBundle;
use driftchat_protocol::message_v1::MessageV1;
use driftchat_protocol::message_v2::MessageV2;
use driftchat_protocol::topic;
use driftchat_protocol::wire;
use driftchat_types::{
    Address, ContentCompression, ConversationContext, EncodedContent, Result, Timestamp,
};

use crate::client::Client;
use crate::conversations::TopicData;
use crate::message::{message_id, DecodedMessage, DecryptedMessage};
use crate::relay::{QueryOptions, SortDirection};

// ---------------------------------------------------------------------------
// Query and send options
// ---------------------------------------------------------------------------

/// Pagination for reading a conversation's messages.
///
/// All fields are forwarded to the relay query.
#[derive(Clone, Debug, Default)]
pub struct MessageQuery {
    /// Maximum number of messages.
    pub limit: Option<usize>,
    /// Only messages sent strictly before this time.
    pub before: Option<Timestamp>,
    /// Only messages sent strictly after this time.
    pub after: Option<Timestamp>,
    /// Result ordering.
    pub direction: SortDirection,
}

impl MessageQuery {
    pub(crate) fn to_options(&self) -> QueryOptions {
        QueryOptions {
            limit: self.limit,
            start_ns: self.after.map(|t| t.as_ns().saturating_add(1)),
            end_ns: self.before.map(|t| t.as_ns().saturating_sub(1)),
            direction: self.direction,
        }
    }
}

/// Options applied to a single send.
#[derive(Clone, Debug)]
pub struct SendOptions {
    /// Compression to apply to the encoded content.
    pub compression: Option<ContentCompression>,
    /// Whether delivery should trigger a push notification (v2 only).
    pub should_push: bool,
    /// Message this one replies to (v2 only).
    pub parent_message_id: Option<String>,
    /// Overrides the send timestamp; defaults to now.
    pub timestamp: Option<Timestamp>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            compression: None,
            should_push: true,
            parent_message_id: None,
            timestamp: None,
        }
    }
}

fn prepare_payload(mut content: EncodedContent, options: &SendOptions) -> Result<Vec<u8>> {
    if options.compression.is_some() {
        content.compression = options.compression;
        compression::compress(&mut content)?;
    }
    wire::encode(&content)
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A session with one peer, v1 or v2.
#[derive(Clone)]
pub enum Conversation {
    /// Direct-addressed session; per-message ECDH.
    V1(ConversationV1),
    /// Invitation-based session with a shared secret.
    V2(ConversationV2),
}

impl Conversation {
    /// The session's topic.
    pub fn topic(&self) -> String {
        match self {
            Self::V1(c) => c.topic(),
            Self::V2(c) => c.topic().to_string(),
        }
    }

    /// The peer's wallet address.
    pub fn peer_address(&self) -> Address {
        match self {
            Self::V1(c) => c.peer_address(),
            Self::V2(c) => c.peer_address(),
        }
    }

    /// When the session was created.
    pub fn created_at(&self) -> Timestamp {
        match self {
            Self::V1(c) => c.created_at(),
            Self::V2(c) => c.created_at(),
        }
    }

    /// The conversation context (v2 sessions only).
    pub fn context(&self) -> Option<&ConversationContext> {
        match self {
            Self::V1(_) => None,
            Self::V2(c) => c.context(),
        }
    }

    /// Sends encoded content, returning the message id.
    pub async fn send(&self, content: EncodedContent, options: SendOptions) -> Result<String> {
        match self {
            Self::V1(c) => c.send(content, options).await,
            Self::V2(c) => c.send(content, options).await,
        }
    }

    /// Sends plain text with default options.
    pub async fn send_text(&self, text: &str) -> Result<String> {
        self.send(TextCodec::encode(&text.to_string())?, SendOptions::default())
            .await
    }

    /// Queries and decodes this session's messages.
    pub async fn messages(&self, query: MessageQuery) -> Result<Vec<DecodedMessage>> {
        match self {
            Self::V1(c) => c.messages(query).await,
            Self::V2(c) => c.messages(query).await,
        }
    }

    /// Unseals one envelope without codec decoding.
    pub fn decrypt_envelope(&self, envelope: &Envelope) -> Result<DecryptedMessage> {
        match self {
            Self::V1(c) => c.decrypt_envelope(envelope),
            Self::V2(c) => c.decrypt_envelope(envelope),
        }
    }

    /// Unseals and codec-decodes one envelope.
    pub fn decode_envelope(&self, envelope: &Envelope) -> Result<DecodedMessage> {
        match self {
            Self::V1(c) => c.decode_envelope(envelope),
            Self::V2(c) => c.decode_envelope(envelope),
        }
    }

    /// Exports the session for persistence.
    pub fn export(&self) -> TopicData {
        match self {
            Self::V1(c) => c.export(),
            Self::V2(c) => c.export(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationV1
// ---------------------------------------------------------------------------

/// v1 session: no shared secret, topic derived from the address pair.
#[derive(Clone)]
pub struct ConversationV1 {
    client: Arc<Client>,
    peer_address: Address,
    created: Timestamp,
}

impl ConversationV1 {
    pub(crate) fn new(client: Arc<Client>, peer_address: Address, created: Timestamp) -> Self {
        Self {
            client,
            peer_address,
            created,
        }
    }

    /// The derived `dm` topic for this address pair.
    pub fn topic(&self) -> String {
        topic::direct_message(&self.client.address(), &self.peer_address)
    }

    /// The peer's wallet address.
    pub fn peer_address(&self) -> Address {
        self.peer_address
    }

    /// When the session was created.
    pub fn created_at(&self) -> Timestamp {
        self.created
    }

    /// Seals and publishes one message.
    ///
    /// The first send to a peer also publishes copies on both
    /// participants' introduction channels so either side can discover
    /// the session; later sends publish the `dm` envelope only.
    pub async fn send(&self, content: EncodedContent, options: SendOptions) -> Result<String> {
        let contact = self.client.contact(&self.peer_address).await?;
        let peer_bundle = match &contact {
            ContactBundle::V1(bundle) => bundle.clone(),
            ContactBundle::V2(bundle) => bundle.to_legacy()?,
        };

        let payload = prepare_payload(content, &options)?;
        let timestamp = options.timestamp.unwrap_or_else(Timestamp::now);
        let message = MessageV1::seal(self.client.keys(), &peer_bundle, &payload, timestamp)?;
        let bytes = wire::encode(&message)?;
        let id = message_id(&bytes);

        let introduce = {
            let registry = self.client.registry.lock().expect("registry lock poisoned");
            !registry.has_introduced.contains(&self.peer_address)
        };

        let mut envelopes = vec![Envelope::new(self.topic(), timestamp, bytes.clone())];
        if introduce {
            envelopes.push(Envelope::new(
                topic::intro(&self.client.address()),
                timestamp,
                bytes.clone(),
            ));
            envelopes.push(Envelope::new(
                topic::intro(&self.peer_address),
                timestamp,
                bytes,
            ));
        }

        self.client.relay().publish(envelopes).await?;

        if introduce {
            let mut registry = self.client.registry.lock().expect("registry lock poisoned");
            registry.has_introduced.insert(self.peer_address);
        }

        tracing::debug!(peer = %self.peer_address, %id, introduced = introduce, "sent v1 message");
        Ok(id)
    }

    /// Queries and decodes this session's messages. Envelopes that
    /// fail to unseal are logged and skipped.
    pub async fn messages(&self, query: MessageQuery) -> Result<Vec<DecodedMessage>> {
        let envelopes = self
            .client
            .relay()
            .query(&self.topic(), query.to_options())
            .await?;

        let mut messages = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            match self.decode_envelope(envelope) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::debug!(error = %e, "skipping undecodable v1 envelope"),
            }
        }
        Ok(messages)
    }

    /// Unseals one envelope without codec decoding.
    pub fn decrypt_envelope(&self, envelope: &Envelope) -> Result<DecryptedMessage> {
        let message: MessageV1 = wire::decode(&envelope.message)?;
        let sender_address = message.sender_address()?;
        let payload = message.open(self.client.keys())?;

        let mut content: EncodedContent = wire::decode(&payload)?;
        compression::decompress(&mut content)?;

        Ok(DecryptedMessage {
            id: message_id(&envelope.message),
            sender_address,
            sent: message.timestamp()?,
            content_topic: envelope.content_topic.clone(),
            content,
        })
    }

    /// Unseals and codec-decodes one envelope.
    pub fn decode_envelope(&self, envelope: &Envelope) -> Result<DecodedMessage> {
        DecodedMessage::from_decrypted(self.decrypt_envelope(envelope)?, self.client.codecs())
    }

    /// Exports the session for persistence.
    pub fn export(&self) -> TopicData {
        TopicData {
            peer_address: self.peer_address,
            created_ns: self.created.as_ns(),
            invitation: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationV2
// ---------------------------------------------------------------------------

/// v2 session: topic and key material from an invitation.
#[derive(Clone)]
pub struct ConversationV2 {
    client: Arc<Client>,
    peer_address: Address,
    created: Timestamp,
    invitation: InvitationV1,
}

impl ConversationV2 {
    pub(crate) fn new(
        client: Arc<Client>,
        peer_address: Address,
        created: Timestamp,
        invitation: InvitationV1,
    ) -> Self {
        Self {
            client,
            peer_address,
            created,
            invitation,
        }
    }

    /// The invitation-established topic.
    pub fn topic(&self) -> &str {
        &self.invitation.topic
    }

    /// The peer's wallet address.
    pub fn peer_address(&self) -> Address {
        self.peer_address
    }

    /// When the session was created.
    pub fn created_at(&self) -> Timestamp {
        self.created
    }

    /// The conversation context carried by the invitation.
    pub fn context(&self) -> Option<&ConversationContext> {
        self.invitation.context.as_ref()
    }

    /// Seals and publishes one message on the session topic.
    pub async fn send(&self, content: EncodedContent, options: SendOptions) -> Result<String> {
        let payload = prepare_payload(content, &options)?;
        let timestamp = options.timestamp.unwrap_or_else(Timestamp::now);

        let message = MessageV2::seal(
            self.client.keys(),
            &self.invitation.key()?,
            self.topic(),
            &payload,
            timestamp.as_ns(),
            options.parent_message_id,
            options.should_push,
        )?;
        let bytes = wire::encode(&message)?;
        let id = message_id(&bytes);

        self.client
            .relay()
            .publish(vec![Envelope::new(self.topic(), timestamp, bytes)])
            .await?;

        tracing::debug!(peer = %self.peer_address, %id, "sent v2 message");
        Ok(id)
    }

    /// Queries and decodes this session's messages. Envelopes that
    /// fail to unseal are logged and skipped.
    pub async fn messages(&self, query: MessageQuery) -> Result<Vec<DecodedMessage>> {
        let envelopes = self
            .client
            .relay()
            .query(self.topic(), query.to_options())
            .await?;

        let mut messages = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            match self.decode_envelope(envelope) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::debug!(error = %e, "skipping undecodable v2 envelope"),
            }
        }
        Ok(messages)
    }

    /// Unseals one envelope without codec decoding.
    pub fn decrypt_envelope(&self, envelope: &Envelope) -> Result<DecryptedMessage> {
        let message: MessageV2 = wire::decode(&envelope.message)?;
        let sender_address = message.sender_address()?;
        let payload = message.open(&self.invitation.key()?)?;

        let mut content: EncodedContent = wire::decode(&payload)?;
        compression::decompress(&mut content)?;

        Ok(DecryptedMessage {
            id: message_id(&envelope.message),
            sender_address,
            sent: message.timestamp()?,
            content_topic: envelope.content_topic.clone(),
            content,
        })
    }

    /// Unseals and codec-decodes one envelope.
    pub fn decode_envelope(&self, envelope: &Envelope) -> Result<DecodedMessage> {
        DecodedMessage::from_decrypted(self.decrypt_envelope(envelope)?, self.client.codecs())
    }

    /// Exports the session for persistence, invitation included.
    pub fn export(&self) -> TopicData {
        TopicData {
            peer_address: self.peer_address,
            created_ns: self.created.as_ns(),
            invitation: Some(self.invitation.clone()),
        }
    }
}
