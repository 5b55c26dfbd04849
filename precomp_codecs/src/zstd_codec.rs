use precomp_core::codec::{Codec, CodecError};
use precomp_core::registry::CodecId;

/// Zstandard, levels 1-22.
///
/// Each payload is one zstd frame with its content size recorded, so decode
/// can size its output up front. Level 3 is the library default and the
/// best speed/ratio trade-off for on-the-fly use; 19+ is for build-time
/// precompression only.
///
/// Best for: general text, JSON, mixed structured data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }

    fn encode(&self, raw: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::bulk::compress(raw, level).map_err(|e| CodecError::EncodeFailed(e.to_string()))
    }

    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(compressed).map_err(|e| CodecError::DecodeFailed(e.to_string()))
    }
}
