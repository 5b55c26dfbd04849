use std::io::{Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use precomp_core::codec::{Codec, CodecError};
use precomp_core::registry::CodecId;

/// LZ4 frame format.
///
/// Fastest of all bundled codecs, with the weakest ratio. lz4_flex exposes no
/// compression levels, so the descriptor pins the range to `1..=1` and the
/// level argument is ignored.
///
/// Best for: hot data where decode latency matters more than size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> CodecId {
        CodecId::Lz4
    }

    fn encode(&self, raw: &[u8], _level: i32) -> Result<Vec<u8>, CodecError> {
        let mut encoder = FrameEncoder::new(Vec::with_capacity(raw.len() / 2));
        encoder
            .write_all(raw)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))
    }

    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut raw = Vec::new();
        FrameDecoder::new(compressed)
            .read_to_end(&mut raw)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;
        Ok(raw)
    }
}
