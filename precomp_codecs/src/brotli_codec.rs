use std::io::Read;

use precomp_core::codec::{Codec, CodecError};
use precomp_core::registry::CodecId;

const BUFFER_SIZE: usize = 4096;
/// Largest window brotli allows (2^22 bytes); what static asset servers use.
const LG_WINDOW: u32 = 22;

/// Brotli, quality 0-11.
///
/// The smallest output of the bundled codecs for text at quality 10-11, and
/// also the slowest to produce. Marked CPU intensive in the descriptor table.
///
/// Best for: precompressed static text assets (HTML, CSS, JS, SVG).
#[derive(Debug, Clone, Copy, Default)]
pub struct BrotliCodec;

impl Codec for BrotliCodec {
    fn id(&self) -> CodecId {
        CodecId::Brotli
    }

    fn encode(&self, raw: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(raw.len() / 2);
        brotli::CompressorReader::new(raw, BUFFER_SIZE, level as u32, LG_WINDOW)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        Ok(out)
    }

    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut raw = Vec::new();
        brotli::Decompressor::new(compressed, BUFFER_SIZE)
            .read_to_end(&mut raw)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
        Ok(raw)
    }
}
