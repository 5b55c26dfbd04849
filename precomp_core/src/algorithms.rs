use crate::error::{Error, Result};
use crate::registry::CodecId;

/// Ordered, validated mapping from codec to compression level.
///
/// Every level is checked against its codec's descriptor range when the set is
/// built, so holders of an `AlgorithmSet` never see an out-of-range level.
/// Each codec appears at most once; iteration follows insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmSet {
    entries: Vec<(CodecId, i32)>,
}

impl AlgorithmSet {
    /// Build from `(codec, level)` pairs. A repeated codec keeps its first
    /// position and takes the last level given.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CodecId, i32)>,
    {
        let mut set = Self { entries: Vec::new() };
        for (codec, level) in entries {
            codec.descriptor().validate_level(level)?;
            set.upsert(codec, level);
        }
        if set.entries.is_empty() {
            return Err(Error::EmptyAlgorithmSet);
        }
        Ok(set)
    }

    pub fn single(codec: CodecId, level: i32) -> Result<Self> {
        Self::new([(codec, level)])
    }

    /// Every codec in `codecs` at its default level.
    pub fn with_defaults<I>(codecs: I) -> Result<Self>
    where
        I: IntoIterator<Item = CodecId>,
    {
        Self::new(
            codecs
                .into_iter()
                .map(|c| (c, c.descriptor().default_level)),
        )
    }

    /// Combine two sets; levels from `other` win for codecs present in both.
    pub fn merge(&self, other: &AlgorithmSet) -> AlgorithmSet {
        let mut merged = self.clone();
        for &(codec, level) in &other.entries {
            merged.upsert(codec, level);
        }
        merged
    }

    fn upsert(&mut self, codec: CodecId, level: i32) {
        match self.entries.iter_mut().find(|(c, _)| *c == codec) {
            Some(entry) => entry.1 = level,
            None => self.entries.push((codec, level)),
        }
    }

    pub fn level(&self, codec: CodecId) -> Option<i32> {
        self.entries
            .iter()
            .find(|(c, _)| *c == codec)
            .map(|&(_, level)| level)
    }

    pub fn contains(&self, codec: CodecId) -> bool {
        self.level(codec).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CodecId, i32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn codecs(&self) -> impl Iterator<Item = CodecId> + '_ {
        self.entries.iter().map(|&(c, _)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed set; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
