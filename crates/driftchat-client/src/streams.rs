//! Conversation and message streaming.
//!
//! Each stream is a spawned task feeding a bounded channel. Transport
//! failures are retried indefinitely without surfacing to the
//! consumer; per-envelope failures are logged and skipped; closing or
//! dropping the stream handle shuts the task down cleanly.
//!
//! The relay contract offers a fixed-topic subscribe, so growing the
//! topic set (a new session discovered mid-stream) cancels the current
//! subscription and immediately resubscribes with the expanded list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use driftchat_protocol::codec::CodecRegistry;
use driftchat_protocol::topic::{self, TopicKind};
use tokio::sync::{mpsc, watch};

use crate::conversation::Conversation;
use crate::conversations::Conversations;
use crate::message::{DecodedMessage, DecryptedMessage};

/// Delay before retrying a failed or dropped subscription.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Buffered items per stream before backpressure.
const STREAM_BUFFER: usize = 64;

/// Sleeps the retry delay, returning `true` when shutdown fired first.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RETRY_DELAY) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

// ---------------------------------------------------------------------------
// ConversationStream
// ---------------------------------------------------------------------------

/// An async sequence of newly discovered sessions.
pub struct ConversationStream {
    rx: mpsc::Receiver<Conversation>,
    shutdown: watch::Sender<bool>,
}

impl ConversationStream {
    /// Waits for the next discovered session. `None` after close.
    pub async fn next(&mut self) -> Option<Conversation> {
        self.rx.recv().await
    }

    /// Tears down the subscription and ends the sequence.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for ConversationStream {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

pub(crate) fn conversation_stream(conversations: Conversations) -> ConversationStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_conversation_stream(conversations, tx, shutdown_rx));
    ConversationStream {
        rx,
        shutdown: shutdown_tx,
    }
}

async fn run_conversation_stream(
    conversations: Conversations,
    tx: mpsc::Sender<Conversation>,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = Arc::clone(conversations.client());
    let topics = vec![
        topic::intro(&client.address()),
        topic::invite(&client.address()),
    ];

    // Sessions known before the stream started are not re-announced.
    let mut emitted: HashSet<String> = conversations.known_topics().into_iter().collect();

    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut subscription = match client.relay().subscribe(topics.clone()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(error = %e, "conversation stream subscribe failed; retrying");
                if sleep_or_shutdown(&mut shutdown).await {
                    return;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        subscription.close();
                        return;
                    }
                }
                envelope = subscription.next() => {
                    let Some(envelope) = envelope else {
                        tracing::warn!("conversation stream ended; resubscribing");
                        if sleep_or_shutdown(&mut shutdown).await {
                            return;
                        }
                        break;
                    };

                    let discovered = match topic::kind(&envelope.content_topic) {
                        Some(TopicKind::Intro) => conversations.from_intro(&envelope),
                        Some(TopicKind::Invite) => conversations.from_invite(&envelope),
                        _ => continue,
                    };

                    match discovered {
                        Ok(conversation) => {
                            if emitted.insert(conversation.topic())
                                && tx.send(conversation).await.is_err()
                            {
                                subscription.close();
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping bootstrap envelope");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DecryptedMessageStream
// ---------------------------------------------------------------------------

/// An async sequence of decrypted messages across all sessions.
pub struct DecryptedMessageStream {
    rx: mpsc::Receiver<DecryptedMessage>,
    shutdown: watch::Sender<bool>,
}

impl DecryptedMessageStream {
    /// Waits for the next message. `None` after close.
    pub async fn next(&mut self) -> Option<DecryptedMessage> {
        self.rx.recv().await
    }

    /// Tears down the subscription and ends the sequence.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for DecryptedMessageStream {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

pub(crate) fn decrypted_message_stream(conversations: Conversations) -> DecryptedMessageStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_message_stream(conversations, tx, shutdown_rx));
    DecryptedMessageStream {
        rx,
        shutdown: shutdown_tx,
    }
}

async fn run_message_stream(
    conversations: Conversations,
    tx: mpsc::Sender<DecryptedMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = Arc::clone(conversations.client());

    'resubscribe: loop {
        if *shutdown.borrow() {
            return;
        }

        let mut topics = vec![
            topic::intro(&client.address()),
            topic::invite(&client.address()),
        ];
        topics.extend(conversations.known_topics());
        let topic_set: HashSet<String> = topics.iter().cloned().collect();

        let mut subscription = match client.relay().subscribe(topics).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(error = %e, "message stream subscribe failed; retrying");
                if sleep_or_shutdown(&mut shutdown).await {
                    return;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        subscription.close();
                        return;
                    }
                }
                envelope = subscription.next() => {
                    let Some(envelope) = envelope else {
                        tracing::warn!("message stream ended; resubscribing");
                        if sleep_or_shutdown(&mut shutdown).await {
                            return;
                        }
                        continue 'resubscribe;
                    };

                    match topic::kind(&envelope.content_topic) {
                        Some(TopicKind::Intro) | Some(TopicKind::Invite) => {
                            let discovered =
                                if topic::kind(&envelope.content_topic) == Some(TopicKind::Intro) {
                                    conversations.from_intro(&envelope)
                                } else {
                                    conversations.from_invite(&envelope)
                                };
                            match discovered {
                                Ok(conversation)
                                    if !topic_set.contains(&conversation.topic()) =>
                                {
                                    // Re-establish with the expanded topic list.
                                    subscription.close();
                                    continue 'resubscribe;
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    tracing::debug!(error = %e, "skipping bootstrap envelope");
                                }
                            }
                        }
                        Some(TopicKind::DirectMessage) | Some(TopicKind::Conversation) => {
                            let Some(conversation) = conversations.get(&envelope.content_topic)
                            else {
                                tracing::debug!(
                                    topic = %envelope.content_topic,
                                    "dropping envelope for unknown session"
                                );
                                continue;
                            };
                            match conversation.decrypt_envelope(&envelope) {
                                Ok(message) => {
                                    if tx.send(message).await.is_err() {
                                        subscription.close();
                                        return;
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(
                                        error = %e,
                                        "skipping undecryptable envelope"
                                    );
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DecodedMessageStream
// ---------------------------------------------------------------------------

/// [`DecryptedMessageStream`] with codec decoding applied; messages
/// that fail to decode are logged and skipped.
pub struct DecodedMessageStream {
    inner: DecryptedMessageStream,
    codecs: Arc<CodecRegistry>,
}

impl DecodedMessageStream {
    /// Waits for the next decodable message. `None` after close.
    pub async fn next(&mut self) -> Option<DecodedMessage> {
        loop {
            let message = self.inner.next().await?;
            match DecodedMessage::from_decrypted(message, &self.codecs) {
                Ok(message) => return Some(message),
                Err(e) => tracing::debug!(error = %e, "skipping undecodable message"),
            }
        }
    }

    /// Tears down the subscription and ends the sequence.
    pub fn close(&self) {
        self.inner.close();
    }
}

pub(crate) fn decoded_message_stream(conversations: Conversations) -> DecodedMessageStream {
    DecodedMessageStream {
        codecs: conversations.client().codecs_handle(),
        inner: decrypted_message_stream(conversations),
    }
}
