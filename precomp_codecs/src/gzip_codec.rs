use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use precomp_core::codec::{Codec, CodecError};
use precomp_core::registry::CodecId;

/// gzip (DEFLATE in a gzip member), levels 1-9.
///
/// Understood by every HTTP client, so it is the variant of last resort when
/// negotiation finds nothing better.
///
/// Best for: universal fallback, `.gz` siblings for static file servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl Codec for GzipCodec {
    fn id(&self) -> CodecId {
        CodecId::Gzip
    }

    fn encode(&self, raw: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(level as u32),
        );
        encoder
            .write_all(raw)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))
    }

    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut raw = Vec::new();
        GzDecoder::new(compressed)
            .read_to_end(&mut raw)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
        Ok(raw)
    }
}
