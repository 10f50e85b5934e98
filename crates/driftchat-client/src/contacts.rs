//! Contact directory contract.
//!
//! Published key bundles live in an external directory (typically a
//! keystore service or the relay's own contact channels). The core
//! consumes it through this trait and validates every bundle it
//! receives; storage and transport are the implementation's concern.

use async_trait::async_trait;
use driftchat_protocol::keys::ContactBundle;
use driftchat_types::{Address, Result};

/// Lookup and publication of contact bundles.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Fetches the published bundle for `address`, if any.
    ///
    /// Implementations return the bundle as published; the client
    /// verifies its signature chain before use.
    async fn lookup(&self, address: &Address) -> Result<Option<ContactBundle>>;

    /// Publishes `bundle` as the current bundle for `address`.
    async fn publish(&self, address: &Address, bundle: ContactBundle) -> Result<()>;
}
