//! The topic → session registry.
//!
//! Discovery merges three sources: the in-memory map, peers seen on
//! the local introduction channel, and sessions carried by sealed
//! invitations on the local invitation channel. A topic, once mapped,
//! is never replaced; re-discovery returns the stored session.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use driftchat_protocol::envelope::Envelope;
use driftchat_protocol::invitation::{InvitationV1, SealedInvitationV1};
use driftchat_protocol::keys::ContactBundle;
use driftchat_protocol::message_v1::MessageV1;
use driftchat_protocol::topic;
use driftchat_protocol::wire;
use driftchat_types::{
    Address, ConversationContext, DriftchatError, Result, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::conversation::{Conversation, ConversationV1, ConversationV2, MessageQuery};
use crate::message::{DecodedMessage, DecryptedMessage};
use crate::relay::{QueryOptions, QueryRequest, MAX_BATCH_TOPICS};
use crate::streams::{
    self, ConversationStream, DecodedMessageStream, DecryptedMessageStream,
};

// ---------------------------------------------------------------------------
// Persisted session record
// ---------------------------------------------------------------------------

/// Persisted form of a session. The presence of `invitation`
/// distinguishes v2 from v1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicData {
    /// The peer's wallet address.
    pub peer_address: Address,
    /// Session creation time, nanoseconds since the epoch.
    pub created_ns: u64,
    /// The invitation backing a v2 session; absent for v1.
    pub invitation: Option<InvitationV1>,
}

// ---------------------------------------------------------------------------
// Registry state
// ---------------------------------------------------------------------------

/// One session in the registry map.
#[derive(Clone)]
pub(crate) enum Session {
    V1 {
        peer_address: Address,
        created: Timestamp,
    },
    V2 {
        peer_address: Address,
        created: Timestamp,
        invitation: InvitationV1,
    },
}

/// Mutable registry state, owned by the participant and guarded by one
/// lock on the client.
pub(crate) struct RegistryState {
    pub sessions: HashMap<String, Session>,
    pub has_introduced: HashSet<Address>,
    intro_watermark: Option<u64>,
    invite_watermark: Option<u64>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            has_introduced: HashSet::new(),
            intro_watermark: None,
            invite_watermark: None,
        }
    }
}

fn context_id(context: Option<&ConversationContext>) -> &str {
    context.map(|c| c.conversation_id.as_str()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// Registry handle: discovery, creation, listing, batch reads, and
/// streaming across all of a participant's sessions.
#[derive(Clone)]
pub struct Conversations {
    client: Arc<Client>,
}

impl Conversations {
    pub(crate) fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &Arc<Client> {
        &self.client
    }

    fn to_conversation(&self, session: &Session) -> Conversation {
        match session {
            Session::V1 {
                peer_address,
                created,
            } => Conversation::V1(ConversationV1::new(
                Arc::clone(&self.client),
                *peer_address,
                *created,
            )),
            Session::V2 {
                peer_address,
                created,
                invitation,
            } => Conversation::V2(ConversationV2::new(
                Arc::clone(&self.client),
                *peer_address,
                *created,
                invitation.clone(),
            )),
        }
    }

    /// Inserts a session unless its topic is already mapped; the
    /// stored session is returned either way. A re-discovered v1
    /// session keeps the earliest creation time seen ("first seen").
    fn insert_session(&self, topic: String, session: Session) -> Session {
        let mut registry = self.client.registry.lock().expect("registry lock poisoned");
        match registry.sessions.entry(topic) {
            Entry::Occupied(mut entry) => {
                if let (
                    Session::V1 {
                        peer_address,
                        created,
                    },
                    Session::V1 {
                        peer_address: new_peer,
                        created: new_created,
                    },
                ) = (entry.get_mut(), &session)
                {
                    if peer_address == new_peer && *new_created < *created {
                        *created = *new_created;
                    }
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(session).clone(),
        }
    }

    /// Snapshot of all known session topics.
    pub(crate) fn known_topics(&self) -> Vec<String> {
        let registry = self.client.registry.lock().expect("registry lock poisoned");
        registry.sessions.keys().cloned().collect()
    }

    /// Looks up the session mapped to `topic`.
    pub(crate) fn get(&self, topic: &str) -> Option<Conversation> {
        let registry = self.client.registry.lock().expect("registry lock poisoned");
        registry.sessions.get(topic).map(|s| self.to_conversation(s))
    }

    // -----------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------

    /// Resolves or creates the session with `peer_address` under
    /// `context`.
    ///
    /// An existing session with the same peer and conversation id is
    /// returned without network I/O. Otherwise: a peer that published
    /// only a v1 bundle (and no context was requested) gets a v1
    /// session; anything else reuses a matching received invitation or
    /// derives a deterministic one and publishes it sealed to both
    /// participants' invitation channels.
    ///
    /// # Errors
    ///
    /// - [`DriftchatError::InvalidArgument`] when `peer_address` is
    ///   the local participant.
    /// - [`DriftchatError::NotFound`] when the peer has published no
    ///   contact bundle.
    pub async fn new_conversation(
        &self,
        peer_address: Address,
        context: Option<ConversationContext>,
    ) -> Result<Conversation> {
        if peer_address == self.client.address() {
            return Err(DriftchatError::InvalidArgument {
                reason: "cannot start a conversation with self".into(),
            });
        }

        let wanted_id = context_id(context.as_ref()).to_string();
        if let Some(existing) = self.find_existing(&peer_address, &wanted_id) {
            return Ok(existing);
        }

        let contact = self.client.contact(&peer_address).await?;

        if matches!(&contact, ContactBundle::V1(_)) && context.is_none() {
            let session = Session::V1 {
                peer_address,
                created: Timestamp::now(),
            };
            let dm_topic = topic::direct_message(&self.client.address(), &peer_address);
            let stored = self.insert_session(dm_topic, session);
            return Ok(self.to_conversation(&stored));
        }

        let peer_bundle = contact.to_signed()?;

        // A previously received invitation may already name this
        // session; importing it keeps both sides on one topic.
        let invite_topic = topic::invite(&self.client.address());
        let envelopes = self
            .client
            .relay()
            .query(&invite_topic, QueryOptions::default())
            .await?;
        for envelope in &envelopes {
            match self.from_invite(envelope) {
                Ok(conversation) => {
                    if conversation.peer_address() == peer_address
                        && context_id(conversation.context()) == wanted_id
                    {
                        return Ok(conversation);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "skipping invitation envelope"),
            }
        }

        let invitation =
            InvitationV1::deterministic(self.client.keys(), &peer_bundle, context)?;
        let created = Timestamp::now();
        let sealed = SealedInvitationV1::seal(
            self.client.keys(),
            &peer_bundle,
            &invitation,
            created.as_ns(),
        )?;
        let bytes = wire::encode(&sealed)?;

        self.client
            .relay()
            .publish(vec![
                Envelope::new(invite_topic, created, bytes.clone()),
                Envelope::new(topic::invite(&peer_address), created, bytes),
            ])
            .await?;

        tracing::debug!(peer = %peer_address, topic = %invitation.topic, "created v2 conversation");

        let stored = self.insert_session(
            invitation.topic.clone(),
            Session::V2 {
                peer_address,
                created,
                invitation,
            },
        );
        Ok(self.to_conversation(&stored))
    }

    fn find_existing(&self, peer_address: &Address, wanted_id: &str) -> Option<Conversation> {
        let registry = self.client.registry.lock().expect("registry lock poisoned");

        let mut v1_match: Option<&Session> = None;
        for session in registry.sessions.values() {
            match session {
                Session::V2 {
                    peer_address: peer,
                    invitation,
                    ..
                } if peer == peer_address
                    && context_id(invitation.context.as_ref()) == wanted_id =>
                {
                    return Some(self.to_conversation(session));
                }
                Session::V1 {
                    peer_address: peer, ..
                } if peer == peer_address && wanted_id.is_empty() => {
                    v1_match = Some(session);
                }
                _ => {}
            }
        }
        v1_match.map(|s| self.to_conversation(s))
    }

    // -----------------------------------------------------------------
    // Synchronous constructors (no network I/O)
    // -----------------------------------------------------------------

    /// Builds (or returns) the v1 session referenced by an
    /// introduction envelope.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::AuthFailure`] when neither verified wallet in
    /// the header is the local participant.
    pub fn from_intro(&self, envelope: &Envelope) -> Result<Conversation> {
        let message: MessageV1 = wire::decode(&envelope.message)?;
        let header = message.header()?;
        let sender = header.sender.verify()?;
        let recipient = header.recipient.verify()?;

        let own = self.client.address();
        let peer_address = if sender == own {
            recipient
        } else if recipient == own {
            sender
        } else {
            return Err(DriftchatError::AuthFailure);
        };

        let dm_topic = topic::direct_message(&own, &peer_address);
        let stored = self.insert_session(
            dm_topic,
            Session::V1 {
                peer_address,
                created: envelope.timestamp(),
            },
        );
        Ok(self.to_conversation(&stored))
    }

    /// Builds (or returns) the v2 session carried by a sealed
    /// invitation envelope.
    ///
    /// # Errors
    ///
    /// - [`DriftchatError::AuthFailure`] when the invitation cannot be
    ///   opened or verified.
    /// - [`DriftchatError::InvalidArgument`] when the invitation names
    ///   a malformed topic.
    pub fn from_invite(&self, envelope: &Envelope) -> Result<Conversation> {
        let sealed: SealedInvitationV1 = wire::decode(&envelope.message)?;
        let invitation = sealed.open(self.client.keys())?;

        if !topic::is_well_formed(&invitation.topic) {
            return Err(DriftchatError::InvalidArgument {
                reason: format!("malformed invitation topic '{}'", invitation.topic),
            });
        }

        let peer_address = sealed.peer_address(&self.client.address())?;
        let created = Timestamp::from_ns(sealed.header()?.created_ns);

        let stored = self.insert_session(
            invitation.topic.clone(),
            Session::V2 {
                peer_address,
                created,
                invitation,
            },
        );
        Ok(self.to_conversation(&stored))
    }

    /// Reconstructs a session from persisted state without network
    /// I/O.
    pub fn import_topic_data(&self, data: TopicData) -> Result<Conversation> {
        let created = Timestamp::from_ns(data.created_ns);
        let (session_topic, session) = match data.invitation {
            Some(invitation) => {
                if !topic::is_well_formed(&invitation.topic) {
                    return Err(DriftchatError::InvalidArgument {
                        reason: format!("malformed persisted topic '{}'", invitation.topic),
                    });
                }
                (
                    invitation.topic.clone(),
                    Session::V2 {
                        peer_address: data.peer_address,
                        created,
                        invitation,
                    },
                )
            }
            None => (
                topic::direct_message(&self.client.address(), &data.peer_address),
                Session::V1 {
                    peer_address: data.peer_address,
                    created,
                },
            ),
        };

        let stored = self.insert_session(session_topic, session);
        Ok(self.to_conversation(&stored))
    }

    // -----------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------

    /// Lists all known sessions, merging the in-memory map with peers
    /// discovered on the introduction channel and sessions carried by
    /// received invitations. Sorted by creation time descending, ties
    /// broken by topic ascending.
    pub async fn list(&self) -> Result<Vec<Conversation>> {
        // Introductions since the last watermark.
        let intro_topic = topic::intro(&self.client.address());
        let start_ns = {
            let registry = self.client.registry.lock().expect("registry lock poisoned");
            registry.intro_watermark.map(|w| w + 1)
        };
        let envelopes = self
            .client
            .relay()
            .query(
                &intro_topic,
                QueryOptions {
                    start_ns,
                    ..QueryOptions::default()
                },
            )
            .await?;
        let mut intro_watermark = None;
        for envelope in &envelopes {
            intro_watermark = intro_watermark.max(Some(envelope.timestamp_ns));
            if let Err(e) = self.from_intro(envelope) {
                tracing::debug!(error = %e, "skipping introduction envelope");
            }
        }

        // Invitations since the last watermark.
        let invite_topic = topic::invite(&self.client.address());
        let start_ns = {
            let registry = self.client.registry.lock().expect("registry lock poisoned");
            registry.invite_watermark.map(|w| w + 1)
        };
        let envelopes = self
            .client
            .relay()
            .query(
                &invite_topic,
                QueryOptions {
                    start_ns,
                    ..QueryOptions::default()
                },
            )
            .await?;
        let mut invite_watermark = None;
        for envelope in &envelopes {
            invite_watermark = invite_watermark.max(Some(envelope.timestamp_ns));
            if let Err(e) = self.from_invite(envelope) {
                tracing::debug!(error = %e, "skipping invitation envelope");
            }
        }

        let mut conversations = {
            let mut registry = self.client.registry.lock().expect("registry lock poisoned");
            if intro_watermark.is_some() {
                registry.intro_watermark = registry.intro_watermark.max(intro_watermark);
            }
            if invite_watermark.is_some() {
                registry.invite_watermark = registry.invite_watermark.max(invite_watermark);
            }
            registry
                .sessions
                .values()
                .map(|s| self.to_conversation(s))
                .collect::<Vec<_>>()
        };

        conversations.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.topic().cmp(&b.topic()))
        });
        Ok(conversations)
    }

    // -----------------------------------------------------------------
    // Batch reads
    // -----------------------------------------------------------------

    /// Reads messages across many topics, decrypted but not decoded.
    ///
    /// Requests are chunked into groups of at most
    /// [`MAX_BATCH_TOPICS`], each dispatched as one multiplexed relay
    /// call. Envelopes whose topic has no registered session are
    /// dropped with a debug event; callers needing completeness warm
    /// the registry with [`Self::list`] first.
    pub async fn list_batch_decrypted_messages(
        &self,
        queries: Vec<(String, MessageQuery)>,
    ) -> Result<Vec<DecryptedMessage>> {
        let mut messages = Vec::new();

        for chunk in queries.chunks(MAX_BATCH_TOPICS) {
            let requests: Vec<QueryRequest> = chunk
                .iter()
                .map(|(content_topic, query)| QueryRequest {
                    content_topic: content_topic.clone(),
                    options: query.to_options(),
                })
                .collect();

            let responses = self.client.relay().batch_query(&requests).await?;
            for envelopes in responses {
                for envelope in envelopes {
                    let Some(conversation) = self.get(&envelope.content_topic) else {
                        tracing::debug!(
                            topic = %envelope.content_topic,
                            "dropping envelope for unknown session"
                        );
                        continue;
                    };
                    match conversation.decrypt_envelope(&envelope) {
                        Ok(message) => messages.push(message),
                        Err(e) => tracing::debug!(error = %e, "skipping undecryptable envelope"),
                    }
                }
            }
        }

        Ok(messages)
    }

    /// Like [`Self::list_batch_decrypted_messages`], with codec
    /// decoding applied.
    pub async fn list_batch_messages(
        &self,
        queries: Vec<(String, MessageQuery)>,
    ) -> Result<Vec<DecodedMessage>> {
        let decrypted = self.list_batch_decrypted_messages(queries).await?;

        let mut messages = Vec::with_capacity(decrypted.len());
        for message in decrypted {
            match DecodedMessage::from_decrypted(message, self.client.codecs()) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::debug!(error = %e, "skipping undecodable message"),
            }
        }
        Ok(messages)
    }

    // -----------------------------------------------------------------
    // Streaming
    // -----------------------------------------------------------------

    /// Streams newly discovered sessions, de-duplicated by topic.
    pub fn stream(&self) -> ConversationStream {
        streams::conversation_stream(self.clone())
    }

    /// Streams decrypted messages across introductions, invitations,
    /// and every known conversation topic, expanding the subscription
    /// as new sessions appear.
    pub fn stream_all_decrypted_messages(&self) -> DecryptedMessageStream {
        streams::decrypted_message_stream(self.clone())
    }

    /// Like [`Self::stream_all_decrypted_messages`], with codec
    /// decoding applied.
    pub fn stream_all_messages(&self) -> DecodedMessageStream {
        streams::decoded_message_stream(self.clone())
    }
}
