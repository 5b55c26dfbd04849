use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};

// ── Codec ids ──────────────────────────────────────────────────────────────

/// Closed set of algorithms the system knows how to describe.
///
/// Knowing an id does not mean it can be used: availability depends on
/// whether an implementation was registered, see [`CodecRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    Gzip,
    Brotli,
    Zstd,
    Lz4,
}

impl CodecId {
    pub const ALL: [CodecId; 4] = [CodecId::Gzip, CodecId::Brotli, CodecId::Zstd, CodecId::Lz4];

    pub fn as_str(self) -> &'static str {
        match self {
            CodecId::Gzip => "gzip",
            CodecId::Brotli => "brotli",
            CodecId::Zstd => "zstd",
            CodecId::Lz4 => "lz4",
        }
    }

    /// Static descriptor for this id, with `available` unset.
    pub fn descriptor(self) -> CodecDescriptor {
        KNOWN_CODECS[self as usize]
    }

    /// Resolve a file suffix (`gz`, `br`, `zst`, `lz4`) with or without dot.
    pub fn from_suffix(suffix: &str) -> Option<CodecId> {
        let suffix = suffix.trim_start_matches('.');
        KNOWN_CODECS
            .iter()
            .find(|d| d.file_suffix.eq_ignore_ascii_case(suffix))
            .map(|d| d.id)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CodecId {
    type Err = Error;

    /// Accepts the id, the wire token or the file suffix, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        KNOWN_CODECS
            .iter()
            .find(|d| {
                d.id.as_str().eq_ignore_ascii_case(name)
                    || d.wire_token.eq_ignore_ascii_case(name)
                    || d.file_suffix.eq_ignore_ascii_case(name)
            })
            .map(|d| d.id)
            .ok_or_else(|| Error::UnknownCodec(name.to_string()))
    }
}

// ── Descriptors ────────────────────────────────────────────────────────────

/// Immutable metadata for one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecDescriptor {
    pub id: CodecId,
    /// Output file extension, without the dot.
    pub file_suffix: &'static str,
    /// Token used in `Accept-Encoding` / `Content-Encoding`.
    pub wire_token: &'static str,
    pub min_level: i32,
    pub max_level: i32,
    pub default_level: i32,
    /// Slow enough at its default level that callers may want to avoid it on
    /// hot paths.
    pub cpu_intensive: bool,
    pub available: bool,
}

impl CodecDescriptor {
    pub fn accepts_level(&self, level: i32) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }

    pub fn validate_level(&self, level: i32) -> Result<()> {
        if self.accepts_level(level) {
            Ok(())
        } else {
            Err(Error::InvalidLevel {
                codec: self.id,
                level,
                min: self.min_level,
                max: self.max_level,
            })
        }
    }
}

/// Indexed by `CodecId as usize`.
const KNOWN_CODECS: [CodecDescriptor; 4] = [
    CodecDescriptor {
        id: CodecId::Gzip,
        file_suffix: "gz",
        wire_token: "gzip",
        min_level: 1,
        max_level: 9,
        default_level: 6,
        cpu_intensive: false,
        available: false,
    },
    CodecDescriptor {
        id: CodecId::Brotli,
        file_suffix: "br",
        wire_token: "br",
        min_level: 0,
        max_level: 11,
        default_level: 11,
        cpu_intensive: true,
        available: false,
    },
    CodecDescriptor {
        id: CodecId::Zstd,
        file_suffix: "zst",
        wire_token: "zstd",
        min_level: 1,
        max_level: 22,
        default_level: 3,
        cpu_intensive: false,
        available: false,
    },
    // lz4 frames have a single speed tier.
    CodecDescriptor {
        id: CodecId::Lz4,
        file_suffix: "lz4",
        wire_token: "lz4",
        min_level: 1,
        max_level: 1,
        default_level: 1,
        cpu_intensive: false,
        available: false,
    },
];

// ── Registry ───────────────────────────────────────────────────────────────

/// Descriptors plus the codec implementations compiled into this process.
///
/// Built once at startup and shared through `Arc`; read-only afterwards.
pub struct CodecRegistry {
    descriptors: [CodecDescriptor; 4],
    codecs: HashMap<CodecId, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Build a registry from codec implementations. Later registrations for
    /// the same id replace earlier ones.
    pub fn new<I>(codecs: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Codec>>,
    {
        let codecs: HashMap<CodecId, Arc<dyn Codec>> =
            codecs.into_iter().map(|c| (c.id(), c)).collect();
        let mut descriptors = KNOWN_CODECS;
        for descriptor in descriptors.iter_mut() {
            descriptor.available = codecs.contains_key(&descriptor.id);
        }
        log::debug!(
            "codec registry: {} of {} codecs available",
            codecs.len(),
            descriptors.len()
        );
        Self { descriptors, codecs }
    }

    /// Registry with no implementations; every codec reports unavailable.
    pub fn empty() -> Self {
        Self::new(Vec::<Arc<dyn Codec>>::new())
    }

    pub fn descriptor_of(&self, id: CodecId) -> &CodecDescriptor {
        &self.descriptors[id as usize]
    }

    /// Resolve a codec by id, wire token or suffix.
    pub fn lookup(&self, name: &str) -> Result<&CodecDescriptor> {
        let id: CodecId = name.parse()?;
        Ok(self.descriptor_of(id))
    }

    pub fn is_available(&self, id: CodecId) -> bool {
        self.descriptor_of(id).available
    }

    pub fn validate_level(&self, id: CodecId, level: i32) -> Result<()> {
        self.descriptor_of(id).validate_level(level)
    }

    /// Descriptors of every registered codec, in id order.
    pub fn available_codecs(&self) -> Vec<CodecDescriptor> {
        self.descriptors.iter().filter(|d| d.available).copied().collect()
    }

    pub fn all_codecs(&self) -> &[CodecDescriptor] {
        &self.descriptors
    }

    pub fn codec(&self, id: CodecId) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(&id)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("available", &self.available_codecs().iter().map(|d| d.id).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use proptest::prelude::*;

    struct Stub(CodecId);

    impl Codec for Stub {
        fn id(&self) -> CodecId {
            self.0
        }
        fn encode(&self, raw: &[u8], _level: i32) -> Result<Vec<u8>, CodecError> {
            Ok(raw.to_vec())
        }
        fn decode(&self, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
            Ok(compressed.to_vec())
        }
    }

    #[test]
    fn table_is_indexed_by_id_and_consistent() {
        for id in CodecId::ALL {
            let d = id.descriptor();
            assert_eq!(d.id, id);
            assert!(d.min_level <= d.default_level && d.default_level <= d.max_level);
        }
    }

    #[test]
    fn availability_follows_registration() {
        let registry = CodecRegistry::new(vec![Arc::new(Stub(CodecId::Zstd)) as Arc<dyn Codec>]);
        assert!(registry.is_available(CodecId::Zstd));
        assert!(!registry.is_available(CodecId::Brotli));
        assert!(registry.codec(CodecId::Gzip).is_none());
        let ids: Vec<_> = registry.available_codecs().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![CodecId::Zstd]);
        assert!(CodecRegistry::empty().available_codecs().is_empty());
    }

    #[test]
    fn parses_ids_tokens_and_suffixes() {
        assert_eq!("brotli".parse::<CodecId>().unwrap(), CodecId::Brotli);
        assert_eq!("BR".parse::<CodecId>().unwrap(), CodecId::Brotli);
        assert_eq!("zst".parse::<CodecId>().unwrap(), CodecId::Zstd);
        assert_eq!(" gz ".parse::<CodecId>().unwrap(), CodecId::Gzip);
        assert_eq!(CodecId::from_suffix(".lz4"), Some(CodecId::Lz4));
        assert_eq!(CodecId::from_suffix("txt"), None);

        let err = "deflate".parse::<CodecId>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownCodec);
        assert!(CodecRegistry::empty().lookup("xz").is_err());
    }

    #[test]
    fn invalid_level_carries_range() {
        let registry = CodecRegistry::empty();
        match registry.validate_level(CodecId::Brotli, 12) {
            Err(Error::InvalidLevel { codec, level, min, max }) => {
                assert_eq!((codec, level, min, max), (CodecId::Brotli, 12, 0, 11));
            }
            other => panic!("expected InvalidLevel, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn validate_level_accepts_exactly_the_range(idx in 0usize..4, level in -50i32..50) {
            let id = CodecId::ALL[idx];
            let d = id.descriptor();
            let registry = CodecRegistry::empty();
            let result = registry.validate_level(id, level);
            if level >= d.min_level && level <= d.max_level {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), crate::error::ErrorKind::InvalidLevel);
            }
        }
    }
}
