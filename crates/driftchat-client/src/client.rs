//! Participant facade.
//!
//! A [`Client`] owns one participant's private key bundle and the
//! collaborator handles everything else flows through: the relay, the
//! contact directory, and the codec registry. All registry state (the
//! topic → session map and the has-introduced set) lives here behind a
//! single lock and is accessed through scoped operations only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use driftchat_protocol::codec::{CodecRegistry, ContentHandler};
use driftchat_protocol::keys::{ContactBundle, PrivateKeyBundle};
use driftchat_types::{Address, DriftchatError, Result};

use crate::contacts::ContactDirectory;
use crate::conversations::{Conversations, RegistryState};
use crate::relay::RelayClient;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A participant: keys, collaborators, and session registry state.
pub struct Client {
    address: Address,
    keys: PrivateKeyBundle,
    relay: Arc<dyn RelayClient>,
    contacts: Arc<dyn ContactDirectory>,
    codecs: Arc<CodecRegistry>,
    contact_cache: Mutex<HashMap<Address, ContactBundle>>,
    pub(crate) registry: Mutex<RegistryState>,
}

impl Client {
    /// Starts building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The participant's wallet address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The codec registry used for decoding received content.
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub(crate) fn keys(&self) -> &PrivateKeyBundle {
        &self.keys
    }

    pub(crate) fn codecs_handle(&self) -> Arc<CodecRegistry> {
        Arc::clone(&self.codecs)
    }

    pub(crate) fn relay(&self) -> &Arc<dyn RelayClient> {
        &self.relay
    }

    /// The conversations registry handle. Handles are cheap; they all
    /// share this client's state.
    pub fn conversations(self: Arc<Self>) -> Conversations {
        Conversations::new(self)
    }

    /// Fetches and verifies the contact bundle for `address`.
    ///
    /// Positive results are cached; the signature chain is verified
    /// and the recovered wallet must match the requested address.
    ///
    /// # Errors
    ///
    /// - [`DriftchatError::NotFound`] when the peer has published no
    ///   bundle.
    /// - [`DriftchatError::AuthFailure`] on a broken chain or an
    ///   address mismatch.
    pub async fn contact(&self, address: &Address) -> Result<ContactBundle> {
        {
            let cache = self.contact_cache.lock().expect("contact cache lock poisoned");
            if let Some(bundle) = cache.get(address) {
                return Ok(bundle.clone());
            }
        }

        let bundle = self
            .contacts
            .lookup(address)
            .await?
            .ok_or_else(|| DriftchatError::NotFound {
                what: format!("contact bundle for {address}"),
            })?;

        let recovered = bundle.verify()?;
        if recovered != *address {
            return Err(DriftchatError::AuthFailure);
        }

        let mut cache = self.contact_cache.lock().expect("contact cache lock poisoned");
        cache.insert(*address, bundle.clone());
        Ok(bundle)
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Configures and constructs a [`Client`].
///
/// The codec registry starts with the built-in codecs; extra handlers
/// can be added before [`build`](Self::build). Building publishes the
/// participant's own contact bundle to the directory so peers can
/// reach it.
pub struct ClientBuilder {
    keys: Option<PrivateKeyBundle>,
    relay: Option<Arc<dyn RelayClient>>,
    contacts: Option<Arc<dyn ContactDirectory>>,
    codecs: CodecRegistry,
}

impl ClientBuilder {
    /// Creates a builder with the default codec registry.
    pub fn new() -> Self {
        Self {
            keys: None,
            relay: None,
            contacts: None,
            codecs: CodecRegistry::with_defaults(),
        }
    }

    /// Sets the participant's private key bundle.
    pub fn keys(mut self, keys: PrivateKeyBundle) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the relay transport.
    pub fn relay(mut self, relay: Arc<dyn RelayClient>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Sets the contact directory.
    pub fn contacts(mut self, contacts: Arc<dyn ContactDirectory>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Registers an additional content handler.
    pub fn codec(mut self, handler: Arc<dyn ContentHandler>) -> Self {
        self.codecs.register(handler);
        self
    }

    /// Builds the client and publishes its contact bundle.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::Invariant`] when a required collaborator is
    /// missing; directory publication failures pass through.
    pub async fn build(self) -> Result<Arc<Client>> {
        let keys = self.keys.ok_or_else(|| DriftchatError::Invariant {
            reason: "client requires a private key bundle".into(),
        })?;
        let relay = self.relay.ok_or_else(|| DriftchatError::Invariant {
            reason: "client requires a relay".into(),
        })?;
        let contacts = self.contacts.ok_or_else(|| DriftchatError::Invariant {
            reason: "client requires a contact directory".into(),
        })?;

        let address = keys.wallet_address();
        contacts
            .publish(&address, ContactBundle::V2(keys.public_bundle()?))
            .await?;

        tracing::debug!(%address, "client ready");

        Ok(Arc::new(Client {
            address,
            keys,
            relay,
            contacts,
            codecs: Arc::new(self.codecs),
            contact_cache: Mutex::new(HashMap::new()),
            registry: Mutex::new(RegistryState::new()),
        }))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
