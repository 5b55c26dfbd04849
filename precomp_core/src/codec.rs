use crate::registry::CodecId;

/// Failure reported by a [`Codec`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The backing library is missing or refused to initialise at runtime.
    #[error("codec unavailable: {0}")]
    Unavailable(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Single-shot compression capability for one algorithm.
///
/// Each `Codec` implementation:
/// - Is identified by a stable [`CodecId`]; the registry keys implementations
///   by it and derives file suffix, wire token and level range from it.
/// - Holds no per-call mutable state, so one instance may serve many items
///   concurrently. This is what lets the engine isolate codecs from each other.
/// - Receives levels already validated against the descriptor range.
pub trait Codec: Send + Sync {
    fn id(&self) -> CodecId;

    /// Compress `raw` at `level`.
    fn encode(&self, raw: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;

    /// Reverse of [`encode`](Codec::encode) at any level.
    fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError>;
}
