use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::registry::CodecId;
use crate::stats::{summarize, BatchStatistics};

/// A recoverable failure recorded as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// What one codec produced for one item.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success { bytes: Vec<u8>, elapsed: Duration },
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Outcome::Success { bytes, .. } => Some(bytes),
            Outcome::Failure(_) => None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.bytes().map(|b| b.len() as u64)
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Outcome::Success { elapsed, .. } => Some(*elapsed),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failure(f) => Some(f),
            Outcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
    /// Every configured codec succeeded.
    Ok,
    /// At least one codec succeeded and at least one failed.
    Partial,
    /// No codec succeeded, or the item failed before any codec ran.
    Failed,
}

/// Per-item outcome, produced once by the engine and never mutated.
#[derive(Debug, Clone)]
pub struct ItemResult {
    id: String,
    original_size: u64,
    outcomes: Vec<(CodecId, Outcome)>,
    fatal: Option<Failure>,
}

impl ItemResult {
    pub(crate) fn new(id: String, original_size: u64, outcomes: Vec<(CodecId, Outcome)>) -> Self {
        Self {
            id,
            original_size,
            outcomes,
            fatal: None,
        }
    }

    /// An item that failed as a whole before any codec ran.
    pub(crate) fn fatal(id: String, original_size: u64, failure: Failure) -> Self {
        Self {
            id,
            original_size,
            outcomes: Vec::new(),
            fatal: Some(failure),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn status(&self) -> ItemStatus {
        if self.fatal.is_some() {
            return ItemStatus::Failed;
        }
        let successes = self.outcomes.iter().filter(|(_, o)| o.is_success()).count();
        if successes == 0 {
            ItemStatus::Failed
        } else if successes == self.outcomes.len() {
            ItemStatus::Ok
        } else {
            ItemStatus::Partial
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == ItemStatus::Ok
    }

    pub fn fatal_error(&self) -> Option<&Failure> {
        self.fatal.as_ref()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (CodecId, &Outcome)> {
        self.outcomes.iter().map(|(c, o)| (*c, o))
    }

    pub fn outcome(&self, codec: CodecId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == codec)
            .map(|(_, o)| o)
    }

    /// Successful outputs in algorithm-set order.
    pub fn successful(&self) -> impl Iterator<Item = (CodecId, &[u8])> {
        self.outcomes
            .iter()
            .filter_map(|(c, o)| o.bytes().map(|b| (*c, b)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (CodecId, &Failure)> {
        self.outcomes
            .iter()
            .filter_map(|(c, o)| o.failure().map(|f| (*c, f)))
    }

    pub fn compressed(&self, codec: CodecId) -> Option<&[u8]> {
        self.outcome(codec).and_then(Outcome::bytes)
    }

    pub fn compressed_size(&self, codec: CodecId) -> Option<u64> {
        self.outcome(codec).and_then(Outcome::size)
    }

    /// `compressed / original`; `None` for a failed codec or an empty input.
    pub fn ratio(&self, codec: CodecId) -> Option<f64> {
        if self.original_size == 0 {
            return None;
        }
        self.compressed_size(codec)
            .map(|size| size as f64 / self.original_size as f64)
    }

    /// `(1 - ratio) * 100`; negative when the codec expanded the input.
    pub fn saved_percent(&self, codec: CodecId) -> Option<f64> {
        self.ratio(codec).map(|r| (1.0 - r) * 100.0)
    }

    pub fn elapsed_ms(&self, codec: CodecId) -> Option<f64> {
        self.outcome(codec)
            .and_then(Outcome::elapsed)
            .map(|d| d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn error(&self, codec: CodecId) -> Option<&Failure> {
        self.outcome(codec).and_then(Outcome::failure)
    }
}

/// Item results keyed by id, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    items: Vec<ItemResult>,
    index: HashMap<String, usize>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: ItemResult) -> Result<()> {
        if self.index.contains_key(result.id()) {
            return Err(Error::DuplicateItem(result.id().to_string()));
        }
        self.index.insert(result.id().to_string(), self.items.len());
        self.items.push(result);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ItemResult> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn first(&self) -> Option<&ItemResult> {
        self.items.first()
    }

    /// True when the batch is non-empty and every item is `Ok`.
    pub fn all_ok(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(ItemResult::is_ok)
    }

    /// Items with at least one usable output (`Ok` or `Partial`).
    pub fn successes(&self) -> Vec<&ItemResult> {
        self.filter(|s| s != ItemStatus::Failed)
    }

    pub fn partials(&self) -> Vec<&ItemResult> {
        self.filter(|s| s == ItemStatus::Partial)
    }

    pub fn failures(&self) -> Vec<&ItemResult> {
        self.filter(|s| s == ItemStatus::Failed)
    }

    fn filter(&self, keep: impl Fn(ItemStatus) -> bool) -> Vec<&ItemResult> {
        self.items.iter().filter(|r| keep(r.status())).collect()
    }

    pub fn summary(&self) -> BatchStatistics {
        summarize(self)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ItemResult> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a ItemResult;
    type IntoIter = std::slice::Iter<'a, ItemResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for BatchResult {
    type Item = ItemResult;
    type IntoIter = std::vec::IntoIter<ItemResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn success(len: usize, ms: u64) -> Outcome {
        Outcome::Success {
            bytes: vec![0u8; len],
            elapsed: Duration::from_millis(ms),
        }
    }

    pub(crate) fn failure(kind: ErrorKind) -> Outcome {
        Outcome::Failure(Failure::new(kind, "boom"))
    }

    #[test]
    fn status_classification() {
        let ok = ItemResult::new("a".into(), 10, vec![(CodecId::Gzip, success(5, 1))]);
        assert_eq!(ok.status(), ItemStatus::Ok);

        let partial = ItemResult::new(
            "b".into(),
            10,
            vec![
                (CodecId::Gzip, success(5, 1)),
                (CodecId::Brotli, failure(ErrorKind::AlgorithmUnavailable)),
            ],
        );
        assert_eq!(partial.status(), ItemStatus::Partial);

        let failed = ItemResult::new(
            "c".into(),
            10,
            vec![(CodecId::Zstd, failure(ErrorKind::EncodeFailed))],
        );
        assert_eq!(failed.status(), ItemStatus::Failed);

        let fatal = ItemResult::fatal(
            "d".into(),
            10,
            Failure::new(ErrorKind::PayloadTooLarge, "too big"),
        );
        assert_eq!(fatal.status(), ItemStatus::Failed);
        assert_eq!(fatal.outcomes().count(), 0);
        assert_eq!(fatal.fatal_error().unwrap().kind, ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn per_codec_queries_never_panic() {
        let r = ItemResult::new(
            "a".into(),
            200,
            vec![
                (CodecId::Gzip, success(50, 4)),
                (CodecId::Zstd, failure(ErrorKind::EncodeFailed)),
            ],
        );
        assert_eq!(r.compressed_size(CodecId::Gzip), Some(50));
        assert_eq!(r.ratio(CodecId::Gzip), Some(0.25));
        assert_eq!(r.saved_percent(CodecId::Gzip), Some(75.0));
        assert_eq!(r.elapsed_ms(CodecId::Gzip), Some(4.0));
        assert_eq!(r.ratio(CodecId::Zstd), None);
        assert_eq!(r.error(CodecId::Zstd).unwrap().kind, ErrorKind::EncodeFailed);
        assert!(r.outcome(CodecId::Lz4).is_none());
        assert!(r.compressed(CodecId::Lz4).is_none());
        assert_eq!(r.successful().map(|(c, _)| c).collect::<Vec<_>>(), vec![CodecId::Gzip]);
        assert_eq!(r.failed().map(|(c, _)| c).collect::<Vec<_>>(), vec![CodecId::Zstd]);

        let empty_input = ItemResult::new("e".into(), 0, vec![(CodecId::Gzip, success(20, 1))]);
        assert_eq!(empty_input.ratio(CodecId::Gzip), None);
        assert_eq!(empty_input.saved_percent(CodecId::Gzip), None);
    }

    #[test]
    fn batch_keeps_order_and_partitions() {
        let mut batch = BatchResult::new();
        assert!(!batch.all_ok());
        assert!(batch.first().is_none());

        batch
            .insert(ItemResult::new("z".into(), 1, vec![(CodecId::Gzip, success(1, 1))]))
            .unwrap();
        batch
            .insert(ItemResult::new(
                "a".into(),
                1,
                vec![(CodecId::Gzip, failure(ErrorKind::EncodeFailed))],
            ))
            .unwrap();
        batch
            .insert(ItemResult::new(
                "m".into(),
                1,
                vec![
                    (CodecId::Gzip, success(1, 1)),
                    (CodecId::Lz4, failure(ErrorKind::AlgorithmUnavailable)),
                ],
            ))
            .unwrap();

        let ids: Vec<_> = batch.iter().map(ItemResult::id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(batch.first().unwrap().id(), "z");
        assert_eq!(batch.get("m").unwrap().status(), ItemStatus::Partial);
        assert!(batch.get("nope").is_none());
        assert!(!batch.all_ok());

        let ids = |v: Vec<&ItemResult>| v.into_iter().map(|r| r.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(batch.successes()), vec!["z", "m"]);
        assert_eq!(ids(batch.partials()), vec!["m"]);
        assert_eq!(ids(batch.failures()), vec!["a"]);

        let dup = batch.insert(ItemResult::new("z".into(), 1, Vec::new()));
        assert_eq!(dup.unwrap_err().kind(), ErrorKind::DuplicateItem);
        assert_eq!(batch.len(), 3);
    }
}
