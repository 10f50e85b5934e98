//! Optional compression of encoded content.
//!
//! Compression applies to the `content` bytes of an [`EncodedContent`]
//! record; the record's `compression` field tells the receiver which
//! algorithm to undo. Applied after codec encoding and before sealing.

use std::io::{Read, Write};

use driftchat_types::{ContentCompression, DriftchatError, EncodedContent, Result};
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression as Level;

/// Compresses `content.content` in place per its `compression` field.
///
/// A record without a `compression` field passes through untouched.
///
/// # Errors
///
/// [`DriftchatError::Protocol`] if the compressor fails.
pub fn compress(content: &mut EncodedContent) -> Result<()> {
    let algorithm = match content.compression {
        Some(algorithm) => algorithm,
        None => return Ok(()),
    };

    let compressed = match algorithm {
        ContentCompression::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
            write_all(&mut encoder, &content.content)?;
            finish(encoder.finish())?
        }
        ContentCompression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Level::default());
            write_all(&mut encoder, &content.content)?;
            finish(encoder.finish())?
        }
    };

    content.content = compressed;
    Ok(())
}

/// Decompresses `content.content` in place per its `compression` field.
///
/// # Errors
///
/// [`DriftchatError::Protocol`] on corrupt compressed data.
pub fn decompress(content: &mut EncodedContent) -> Result<()> {
    let algorithm = match content.compression {
        Some(algorithm) => algorithm,
        None => return Ok(()),
    };

    let mut decompressed = Vec::new();
    let result = match algorithm {
        ContentCompression::Deflate => {
            DeflateDecoder::new(content.content.as_slice()).read_to_end(&mut decompressed)
        }
        ContentCompression::Gzip => {
            GzDecoder::new(content.content.as_slice()).read_to_end(&mut decompressed)
        }
    };
    result.map_err(|e| DriftchatError::Protocol {
        reason: format!("decompression failed: {e}"),
    })?;

    content.content = decompressed;
    Ok(())
}

fn write_all<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(|e| DriftchatError::Protocol {
        reason: format!("compression failed: {e}"),
    })
}

fn finish(result: std::io::Result<Vec<u8>>) -> Result<Vec<u8>> {
    result.map_err(|e| DriftchatError::Protocol {
        reason: format!("compression failed: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ContentCodec, TextCodec};

    fn sample(compression: Option<ContentCompression>) -> EncodedContent {
        let mut content =
            TextCodec::encode(&"a ".repeat(500)).expect("text encoding");
        content.compression = compression;
        content
    }

    #[test]
    fn deflate_roundtrip() -> Result<()> {
        let mut content = sample(Some(ContentCompression::Deflate));
        let original = content.content.clone();

        compress(&mut content)?;
        assert!(content.content.len() < original.len());

        decompress(&mut content)?;
        assert_eq!(content.content, original);
        Ok(())
    }

    #[test]
    fn gzip_roundtrip() -> Result<()> {
        let mut content = sample(Some(ContentCompression::Gzip));
        let original = content.content.clone();

        compress(&mut content)?;
        decompress(&mut content)?;
        assert_eq!(content.content, original);
        Ok(())
    }

    #[test]
    fn no_compression_is_identity() -> Result<()> {
        let mut content = sample(None);
        let original = content.content.clone();
        compress(&mut content)?;
        assert_eq!(content.content, original);
        Ok(())
    }

    #[test]
    fn corrupt_data_rejected() {
        let mut content = sample(Some(ContentCompression::Gzip));
        content.content = vec![0x00, 0x01, 0x02];
        assert!(decompress(&mut content).is_err());
    }
}
