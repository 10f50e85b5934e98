//! End-to-end scenarios for the conversations registry.
//!
//! All participants use deterministic wallet seeds and share an
//! in-memory relay and contact directory per test. Streaming tests
//! allow short settling pauses for subscription establishment; no
//! assertion depends on wall-clock time.

mod support;

use std::future::Future;
use std::time::Duration;

use driftchat_client::conversation::{MessageQuery, SendOptions};
use driftchat_client::conversations::TopicData;
use driftchat_client::relay::{QueryOptions, RelayClient, SortDirection};
use driftchat_protocol::codec::ContentCodec;
use driftchat_protocol::envelope::Envelope;
use driftchat_protocol::message_v2::MessageV2;
use driftchat_protocol::wire;
use driftchat_types::{ConversationContext, Timestamp};

use support::{legacy_participant, participant, InMemoryDirectory, InMemoryRelay};

async fn within<T>(future: impl Future<Output = Option<T>>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out waiting for stream item")
        .expect("stream ended unexpectedly")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

// ---------------------------------------------------------------------------
// E1 — v1 round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e1_v1_round_trip() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x01, &relay, &directory).await;
    let bob = legacy_participant(0x02, &relay, &directory).await;

    let conversation = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), None)
        .await
        .expect("v1 conversation");
    conversation.send_text("hello").await.expect("send");

    let bob_conversations = bob.clone().conversations().list().await.expect("list");
    assert_eq!(bob_conversations.len(), 1);
    assert_eq!(bob_conversations[0].peer_address(), alice.address());
    assert_eq!(bob_conversations[0].topic(), conversation.topic());

    let messages = bob_conversations[0]
        .messages(MessageQuery::default())
        .await
        .expect("messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), Some("hello"));
    assert_eq!(messages[0].sender_address, alice.address());
}

// ---------------------------------------------------------------------------
// E2 — intro duplication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e2_intro_duplication() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x03, &relay, &directory).await;
    let bob = legacy_participant(0x04, &relay, &directory).await;

    let conversation = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), None)
        .await
        .expect("v1 conversation");

    conversation.send_text("first").await.expect("first send");
    assert_eq!(relay.published_envelopes(), 3); // dm + intro-alice + intro-bob

    conversation.send_text("second").await.expect("second send");
    assert_eq!(relay.published_envelopes(), 4); // dm only
}

// ---------------------------------------------------------------------------
// E3 — v2 deterministic creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e3_v2_deterministic_creation() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x05, &relay, &directory).await;
    let bob = participant(0x06, &relay, &directory).await;

    let context = Some(ConversationContext::new("example.com/x"));
    let from_alice = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), context.clone())
        .await
        .expect("alice side");
    let from_bob = bob
        .clone()
        .conversations()
        .new_conversation(alice.address(), context)
        .await
        .expect("bob side");

    assert_eq!(from_alice.topic(), from_bob.topic());

    let alice_invitation = from_alice.export().invitation.expect("v2 export");
    let bob_invitation = from_bob.export().invitation.expect("v2 export");
    assert_eq!(alice_invitation.key_material, bob_invitation.key_material);
    assert_eq!(alice_invitation.key_material.len(), 32);
}

// ---------------------------------------------------------------------------
// E4 — invitation round-trip over the invite channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e4_invitation_round_trip() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x07, &relay, &directory).await;
    let bob = participant(0x08, &relay, &directory).await;

    let bob_conversations = bob.clone().conversations();
    let mut discoveries = bob_conversations.stream();
    settle().await;

    let from_alice = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), None)
        .await
        .expect("alice side");

    let discovered = within(discoveries.next()).await;
    assert_eq!(discovered.topic(), from_alice.topic());
    assert_eq!(discovered.peer_address(), alice.address());
    discoveries.close();
}

// ---------------------------------------------------------------------------
// E5 — stream expansion on a new invitation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e5_stream_expansion() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x09, &relay, &directory).await;
    let bob = participant(0x0a, &relay, &directory).await;

    let bob_conversations = bob.clone().conversations();
    let mut messages = bob_conversations.stream_all_messages();
    settle().await;

    let conversation = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), Some(ConversationContext::new("example.com/e5")))
        .await
        .expect("v2 conversation");

    // Give the stream time to observe the invitation and re-establish
    // its subscription with the new topic.
    settle().await;

    // The session discovery must have landed before the message.
    let known = bob_conversations.list().await.expect("list");
    assert!(known.iter().any(|c| c.topic() == conversation.topic()));

    conversation.send_text("ping").await.expect("send");

    let received = within(messages.next()).await;
    assert_eq!(received.text(), Some("ping"));
    assert_eq!(received.content_topic, conversation.topic());
    messages.close();
}

// ---------------------------------------------------------------------------
// E6 — tampered envelope is skipped, stream continues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e6_tampered_envelope_skipped() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x0b, &relay, &directory).await;
    let bob = participant(0x0c, &relay, &directory).await;

    let bob_conversations = bob.clone().conversations();
    let mut messages = bob_conversations.stream_all_messages();
    settle().await;

    let conversation = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), None)
        .await
        .expect("v2 conversation");
    settle().await;

    conversation.send_text("first").await.expect("first send");

    // Flip one ciphertext byte of a copy of the sealed message and
    // republish it on the same topic.
    let envelopes = relay
        .query(&conversation.topic(), QueryOptions::default())
        .await
        .expect("query");
    let mut tampered: MessageV2 =
        wire::decode(&envelopes[0].message).expect("decode sealed message");
    tampered.ciphertext.payload[0] ^= 0x01;
    relay
        .publish(vec![Envelope::new(
            conversation.topic(),
            Timestamp::now(),
            wire::encode(&tampered).expect("encode tampered"),
        )])
        .await
        .expect("publish tampered");

    conversation.send_text("second").await.expect("second send");

    let first = within(messages.next()).await;
    assert_eq!(first.text(), Some("first"));
    let second = within(messages.next()).await;
    assert_eq!(second.text(), Some("second"));
    messages.close();

    // The listing path skips the tampered envelope the same way.
    let listed = conversation
        .messages(MessageQuery::default())
        .await
        .expect("messages");
    assert_eq!(listed.len(), 2);
}

// ---------------------------------------------------------------------------
// Property 5 — list order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_sorted_created_descending_with_unique_topics() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x0d, &relay, &directory).await;

    for (seed, id) in [(0x0e, "a"), (0x0f, "b"), (0x10, "c")] {
        let peer = participant(seed, &relay, &directory).await;
        alice
            .clone()
            .conversations()
            .new_conversation(peer.address(), Some(ConversationContext::new(id)))
            .await
            .expect("conversation");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let listed = alice.clone().conversations().list().await.expect("list");
    assert_eq!(listed.len(), 3);

    for pair in listed.windows(2) {
        assert!(pair[0].created_at() > pair[1].created_at());
    }

    let mut topics: Vec<String> = listed.iter().map(|c| c.topic()).collect();
    topics.sort();
    topics.dedup();
    assert_eq!(topics.len(), 3);
}

// ---------------------------------------------------------------------------
// Property 6 — creation is idempotent without network I/O
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_new_conversation_reuses_session_without_io() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x11, &relay, &directory).await;
    let bob = participant(0x12, &relay, &directory).await;

    let context = Some(ConversationContext::new("example.com/idem"));
    let conversations = alice.clone().conversations();
    let first = conversations
        .new_conversation(bob.address(), context.clone())
        .await
        .expect("first creation");

    let queries_before = relay.query_calls();
    let published_before = relay.published_envelopes();

    let second = conversations
        .new_conversation(bob.address(), context)
        .await
        .expect("second resolution");

    assert_eq!(first.topic(), second.topic());
    assert_eq!(relay.query_calls(), queries_before);
    assert_eq!(relay.published_envelopes(), published_before);
}

// ---------------------------------------------------------------------------
// Property 7 — batch chunking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_query_chunks_by_fifty() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x13, &relay, &directory).await;

    let queries: Vec<(String, MessageQuery)> = (0..120)
        .map(|i| (format!("/xmtp/0/m-batch{i}/proto"), MessageQuery::default()))
        .collect();

    let messages = alice
        .clone()
        .conversations()
        .list_batch_messages(queries)
        .await
        .expect("batch");

    assert!(messages.is_empty());
    assert_eq!(relay.batch_calls(), 3); // ceil(120 / 50)
}

// ---------------------------------------------------------------------------
// Persistence round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn import_topic_data_rebuilds_sessions_without_io() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x14, &relay, &directory).await;
    let bob = participant(0x15, &relay, &directory).await;

    let conversations = alice.clone().conversations();
    let created = conversations
        .new_conversation(bob.address(), Some(ConversationContext::new("persist")))
        .await
        .expect("conversation");

    let exported = created.export();
    assert!(exported.invitation.is_some());
    assert_eq!(exported.peer_address, bob.address());

    // Re-import is a pure registry operation.
    let queries_before = relay.query_calls();
    let imported = conversations
        .import_topic_data(exported)
        .expect("import v2");
    assert_eq!(imported.topic(), created.topic());
    assert_eq!(relay.query_calls(), queries_before);

    // A v1 record (no invitation) maps to the dm topic.
    let v1 = conversations
        .import_topic_data(TopicData {
            peer_address: bob.address(),
            created_ns: 42,
            invitation: None,
        })
        .expect("import v1");
    assert!(v1.topic().contains("/dm-"));
    assert_eq!(v1.created_at().as_ns(), 42);
    assert_eq!(relay.query_calls(), queries_before);
}

// ---------------------------------------------------------------------------
// v1 pagination is forwarded to the relay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn v1_messages_forward_pagination() {
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let alice = participant(0x16, &relay, &directory).await;
    let bob = legacy_participant(0x17, &relay, &directory).await;

    let conversation = alice
        .clone()
        .conversations()
        .new_conversation(bob.address(), None)
        .await
        .expect("v1 conversation");

    for (ns, text) in [(1_000, "one"), (2_000, "two"), (3_000, "three")] {
        conversation
            .send(
                driftchat_protocol::codec::TextCodec::encode(&text.to_string()).expect("encode"),
                SendOptions {
                    timestamp: Some(Timestamp::from_ns(ns)),
                    ..SendOptions::default()
                },
            )
            .await
            .expect("send");
    }

    let bob_conversations = bob.clone().conversations().list().await.expect("list");
    let bob_conversation = &bob_conversations[0];

    let limited = bob_conversation
        .messages(MessageQuery {
            limit: Some(2),
            direction: SortDirection::Descending,
            ..MessageQuery::default()
        })
        .await
        .expect("limited query");
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].text(), Some("three"));

    let after = bob_conversation
        .messages(MessageQuery {
            after: Some(Timestamp::from_ns(1_000)),
            ..MessageQuery::default()
        })
        .await
        .expect("after query");
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].text(), Some("two"));

    let before = bob_conversation
        .messages(MessageQuery {
            before: Some(Timestamp::from_ns(3_000)),
            ..MessageQuery::default()
        })
        .await
        .expect("before query");
    assert_eq!(before.len(), 2);
    assert_eq!(before[1].text(), Some("two"));
}
