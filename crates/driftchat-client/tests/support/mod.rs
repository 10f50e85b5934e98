//! In-memory relay and contact directory for integration tests.
//!
//! The relay keeps every published envelope per topic, serves queries
//! with the same filtering a real relay would, and pushes envelopes to
//! live subscriptions. Counters expose publish and batch activity so
//! tests can assert on traffic shape.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use driftchat_client::client::Client;
use driftchat_client::contacts::ContactDirectory;
use driftchat_client::relay::{
    QueryOptions, QueryRequest, RelayClient, SortDirection, Subscription,
};
use driftchat_crypto::wallet::LocalWallet;
use driftchat_protocol::envelope::Envelope;
use driftchat_protocol::keys::{ContactBundle, PrivateKeyBundle};
use driftchat_types::{Address, Result};
use tokio::sync::{mpsc, watch};

const SUBSCRIBER_BUFFER: usize = 256;

// ---------------------------------------------------------------------------
// InMemoryRelay
// ---------------------------------------------------------------------------

struct Subscriber {
    topics: HashSet<String>,
    tx: mpsc::Sender<Envelope>,
    closed: watch::Receiver<bool>,
}

impl Subscriber {
    fn is_closed(&self) -> bool {
        self.closed.has_changed().is_err() || *self.closed.borrow()
    }
}

#[derive(Default)]
pub struct InMemoryRelay {
    topics: Mutex<HashMap<String, Vec<Envelope>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    query_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    published: AtomicUsize,
}

impl InMemoryRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn published_envelopes(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    fn matching(&self, topic: &str, options: &QueryOptions) -> Vec<Envelope> {
        let topics = self.topics.lock().expect("relay lock poisoned");
        let mut envelopes: Vec<Envelope> = topics
            .get(topic)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|e| options.start_ns.map_or(true, |s| e.timestamp_ns >= s))
                    .filter(|e| options.end_ns.map_or(true, |s| e.timestamp_ns <= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        envelopes.sort_by_key(|e| e.timestamp_ns);
        if options.direction == SortDirection::Descending {
            envelopes.reverse();
        }
        if let Some(limit) = options.limit {
            envelopes.truncate(limit);
        }
        envelopes
    }
}

#[async_trait]
impl RelayClient for InMemoryRelay {
    async fn query(&self, topic: &str, options: QueryOptions) -> Result<Vec<Envelope>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(topic, &options))
    }

    async fn batch_query(&self, requests: &[QueryRequest]) -> Result<Vec<Vec<Envelope>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|r| self.matching(&r.content_topic, &r.options))
            .collect())
    }

    async fn publish(&self, envelopes: Vec<Envelope>) -> Result<()> {
        self.published.fetch_add(envelopes.len(), Ordering::SeqCst);

        {
            let mut topics = self.topics.lock().expect("relay lock poisoned");
            for envelope in &envelopes {
                topics
                    .entry(envelope.content_topic.clone())
                    .or_default()
                    .push(envelope.clone());
            }
        }

        let mut subscribers = self.subscribers.lock().expect("relay lock poisoned");
        subscribers.retain(|s| !s.is_closed());
        for subscriber in subscribers.iter() {
            for envelope in &envelopes {
                if subscriber.topics.contains(&envelope.content_topic) {
                    let _ = subscriber.tx.try_send(envelope.clone());
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topics: Vec<String>) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (close_tx, close_rx) = watch::channel(false);

        let mut subscribers = self.subscribers.lock().expect("relay lock poisoned");
        subscribers.push(Subscriber {
            topics: topics.into_iter().collect(),
            tx,
            closed: close_rx,
        });

        Ok(Subscription::new(rx, close_tx))
    }
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryDirectory {
    bundles: Mutex<HashMap<Address, ContactBundle>>,
}

impl InMemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ContactDirectory for InMemoryDirectory {
    async fn lookup(&self, address: &Address) -> Result<Option<ContactBundle>> {
        let bundles = self.bundles.lock().expect("directory lock poisoned");
        Ok(bundles.get(address).cloned())
    }

    async fn publish(&self, address: &Address, bundle: ContactBundle) -> Result<()> {
        let mut bundles = self.bundles.lock().expect("directory lock poisoned");
        bundles.insert(*address, bundle);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Builds a client from a deterministic wallet seed.
pub async fn participant(
    seed: u8,
    relay: &Arc<InMemoryRelay>,
    directory: &Arc<InMemoryDirectory>,
) -> Arc<Client> {
    build_participant(seed, relay, directory, false).await
}

/// Builds a client that publishes only a legacy (v1) contact bundle.
pub async fn legacy_participant(
    seed: u8,
    relay: &Arc<InMemoryRelay>,
    directory: &Arc<InMemoryDirectory>,
) -> Arc<Client> {
    build_participant(seed, relay, directory, true).await
}

async fn build_participant(
    seed: u8,
    relay: &Arc<InMemoryRelay>,
    directory: &Arc<InMemoryDirectory>,
    legacy: bool,
) -> Arc<Client> {
    let mut bytes = [0u8; 32];
    bytes[31] = seed;
    let wallet = LocalWallet::from_bytes(&bytes).expect("valid wallet seed");
    let keys = PrivateKeyBundle::generate(&wallet).expect("bundle generation");
    let legacy_bundle = keys.legacy_bundle().expect("legacy bundle");

    let client = Client::builder()
        .keys(keys)
        .relay(Arc::clone(relay) as Arc<dyn RelayClient>)
        .contacts(Arc::clone(directory) as Arc<dyn ContactDirectory>)
        .build()
        .await
        .expect("client build");

    if legacy {
        directory
            .publish(&client.address(), ContactBundle::V1(legacy_bundle))
            .await
            .expect("legacy publish");
    }
    client
}
