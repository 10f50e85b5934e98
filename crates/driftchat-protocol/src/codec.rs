//! Pluggable content codecs.
//!
//! Message payloads are [`EncodedContent`] records tagged with a
//! [`ContentTypeId`]. A [`ContentCodec`] converts between a typed
//! value and its encoded record; the [`CodecRegistry`] maps content
//! types to erased handlers for decoding received payloads. The
//! registry is populated with the built-in codecs before any
//! send/receive operation runs.

use std::collections::HashMap;
use std::sync::Arc;

use driftchat_types::{ContentTypeId, DriftchatError, EncodedContent, Result};

/// Authority of the built-in content types.
pub const CONTENT_AUTHORITY: &str = "xmtp.org";

/// Returns the content type of plain UTF-8 text.
pub fn text_content_type() -> ContentTypeId {
    ContentTypeId::new(CONTENT_AUTHORITY, "text", 1, 0)
}

// ---------------------------------------------------------------------------
// ContentCodec
// ---------------------------------------------------------------------------

/// Converts a typed value to and from its encoded record.
pub trait ContentCodec<T> {
    /// The content type this codec handles.
    fn content_type() -> ContentTypeId;

    /// Encodes a value.
    fn encode(content: &T) -> Result<EncodedContent>;

    /// Decodes a received record.
    fn decode(content: &EncodedContent) -> Result<T>;

    /// Out-of-band description for clients that cannot render the
    /// content.
    fn fallback(content: &T) -> Option<String>;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// Codec for plain UTF-8 text (`xmtp.org/text:1.0`).
pub struct TextCodec;

/// Encoding parameter key carried by text content.
const ENCODING_KEY: &str = "encoding";

impl ContentCodec<String> for TextCodec {
    fn content_type() -> ContentTypeId {
        text_content_type()
    }

    fn encode(content: &String) -> Result<EncodedContent> {
        let mut parameters = std::collections::BTreeMap::new();
        parameters.insert(ENCODING_KEY.to_string(), "UTF-8".to_string());
        Ok(EncodedContent {
            content_type: Self::content_type(),
            parameters,
            fallback: None,
            compression: None,
            content: content.as_bytes().to_vec(),
        })
    }

    fn decode(content: &EncodedContent) -> Result<String> {
        if let Some(encoding) = content.parameters.get(ENCODING_KEY) {
            if encoding != "UTF-8" {
                return Err(DriftchatError::InvalidArgument {
                    reason: format!("unsupported text encoding '{encoding}'"),
                });
            }
        }
        String::from_utf8(content.content.clone()).map_err(|_| DriftchatError::InvalidArgument {
            reason: "text content is not valid UTF-8".into(),
        })
    }

    fn fallback(content: &String) -> Option<String> {
        Some(content.clone())
    }
}

// ---------------------------------------------------------------------------
// Erased handlers and the registry
// ---------------------------------------------------------------------------

/// A decoded payload body, independent of the concrete codec type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodedBody {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes for content types without a richer mapping.
    Bytes(Vec<u8>),
}

impl DecodedBody {
    /// The text form, when this body is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

/// Type-erased codec stored in the registry.
pub trait ContentHandler: Send + Sync {
    /// The content type this handler decodes.
    fn content_type(&self) -> ContentTypeId;

    /// Decodes a received record into a generic body.
    fn decode_body(&self, content: &EncodedContent) -> Result<DecodedBody>;
}

struct TextHandler;

impl ContentHandler for TextHandler {
    fn content_type(&self) -> ContentTypeId {
        text_content_type()
    }

    fn decode_body(&self, content: &EncodedContent) -> Result<DecodedBody> {
        Ok(DecodedBody::Text(TextCodec::decode(content)?))
    }
}

/// Maps content types to decoding handlers.
///
/// Keyed on `(authority, type)`; version negotiation is left to the
/// handler. Built eagerly with the default codecs so the registry is
/// populated before any send/receive operation.
pub struct CodecRegistry {
    handlers: HashMap<(String, String), Arc<dyn ContentHandler>>,
}

impl CodecRegistry {
    /// Creates a registry holding the built-in codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(Arc::new(TextHandler));
        registry
    }

    /// Registers a handler, replacing any previous one for the same
    /// content type.
    pub fn register(&mut self, handler: Arc<dyn ContentHandler>) {
        let id = handler.content_type();
        self.handlers
            .insert((id.authority_id, id.type_id), handler);
    }

    /// Looks up the handler for a content type.
    ///
    /// # Errors
    ///
    /// [`DriftchatError::InvalidArgument`] for an unknown type.
    pub fn handler(&self, content_type: &ContentTypeId) -> Result<&Arc<dyn ContentHandler>> {
        self.handlers
            .get(&(
                content_type.authority_id.clone(),
                content_type.type_id.clone(),
            ))
            .ok_or_else(|| DriftchatError::InvalidArgument {
                reason: format!("no codec registered for content type {content_type}"),
            })
    }

    /// Decodes a record with its registered handler.
    pub fn decode(&self, content: &EncodedContent) -> Result<DecodedBody> {
        self.handler(&content.content_type)?.decode_body(content)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
