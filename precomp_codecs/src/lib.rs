//! Codec implementations bundled with precomp.
//!
//! gzip is always built; brotli, zstd and lz4 sit behind Cargo features of the
//! same name (all on by default). A codec whose feature is off is simply not
//! registered, and the registry reports it as unavailable.

mod gzip_codec;
#[cfg(feature = "brotli")]
mod brotli_codec;
#[cfg(feature = "lz4")]
mod lz4_codec;
#[cfg(feature = "zstd")]
mod zstd_codec;

pub use gzip_codec::GzipCodec;
#[cfg(feature = "brotli")]
pub use brotli_codec::BrotliCodec;
#[cfg(feature = "lz4")]
pub use lz4_codec::Lz4Codec;
#[cfg(feature = "zstd")]
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use precomp_core::{Codec, CodecId, CodecRegistry};

/// Resolve the bundled implementation for `id`, `None` when its feature is off.
#[allow(unreachable_patterns)]
pub fn codec_by_id(id: CodecId) -> Option<Arc<dyn Codec>> {
    match id {
        CodecId::Gzip => Some(Arc::new(GzipCodec)),
        #[cfg(feature = "brotli")]
        CodecId::Brotli => Some(Arc::new(BrotliCodec)),
        #[cfg(feature = "zstd")]
        CodecId::Zstd => Some(Arc::new(ZstdCodec)),
        #[cfg(feature = "lz4")]
        CodecId::Lz4 => Some(Arc::new(Lz4Codec)),
        _ => None,
    }
}

/// Registry holding every codec compiled into this build.
pub fn default_registry() -> CodecRegistry {
    CodecRegistry::new(CodecId::ALL.into_iter().filter_map(codec_by_id))
}
