//! Relay client contract.
//!
//! The relay is an untrusted pub/sub topic bus. The core consumes it
//! through this trait: paginated query, multiplexed batch query,
//! publish, and server-push subscribe. Implementations wrap whatever
//! transport serves those verbs; the in-tree test double lives with
//! the integration tests.

use async_trait::async_trait;
use driftchat_protocol::envelope::Envelope;
use driftchat_types::Result;
use tokio::sync::{mpsc, watch};

/// Maximum topics per underlying batch-query request. The registry
/// chunks larger requests.
pub const MAX_BATCH_TOPICS: usize = 50;

// ---------------------------------------------------------------------------
// Query shapes
// ---------------------------------------------------------------------------

/// Server-side sort order for query results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortDirection {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Options forwarded with a topic query.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Maximum number of envelopes to return.
    pub limit: Option<usize>,
    /// Inclusive lower bound on `timestamp_ns`.
    pub start_ns: Option<u64>,
    /// Inclusive upper bound on `timestamp_ns`.
    pub end_ns: Option<u64>,
    /// Result ordering.
    pub direction: SortDirection,
}

/// One topic's query within a batch.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    /// Topic to query.
    pub content_topic: String,
    /// Pagination options for this topic.
    pub options: QueryOptions,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A server-push envelope stream.
///
/// Closing (or dropping) the subscription tears the underlying stream
/// down; the relay implementation watches the close signal.
pub struct Subscription {
    envelopes: mpsc::Receiver<Envelope>,
    close: watch::Sender<bool>,
}

impl Subscription {
    /// Builds a subscription from its transport-facing halves.
    ///
    /// The implementation keeps the paired `mpsc::Sender` and a
    /// `watch::Receiver` of the close flag.
    pub fn new(envelopes: mpsc::Receiver<Envelope>, close: watch::Sender<bool>) -> Self {
        Self { envelopes, close }
    }

    /// Waits for the next envelope. Returns `None` once the stream
    /// ends (transport drop or close).
    pub async fn next(&mut self) -> Option<Envelope> {
        self.envelopes.recv().await
    }

    /// Signals the transport to stop delivering envelopes.
    pub fn close(&self) {
        let _ = self.close.send(true);
    }
}

// ---------------------------------------------------------------------------
// RelayClient
// ---------------------------------------------------------------------------

/// The pub/sub verbs the core needs from a relay transport.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Queries one topic, handling relay-side pagination internally.
    async fn query(&self, topic: &str, options: QueryOptions) -> Result<Vec<Envelope>>;

    /// Dispatches up to [`MAX_BATCH_TOPICS`] topic queries as one
    /// multiplexed call. Responses align with `requests` by index.
    async fn batch_query(&self, requests: &[QueryRequest]) -> Result<Vec<Vec<Envelope>>>;

    /// Publishes envelopes.
    async fn publish(&self, envelopes: Vec<Envelope>) -> Result<()>;

    /// Opens a server-push stream over `topics`.
    async fn subscribe(&self, topics: Vec<String>) -> Result<Subscription>;
}
