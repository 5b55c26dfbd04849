//! Aggregate and order statistics over a [`BatchResult`].
//!
//! Everything here is computed on demand and never fails: empty series
//! produce `0.0`, inputs of zero bytes are left out of ratio series.

use serde::Serialize;

use crate::registry::CodecId;
use crate::result::{BatchResult, ItemStatus, Outcome};

/// Nearest-rank percentile: sort ascending and take index
/// `ceil(n * p / 100) - 1`, clamped to `[0, n - 1]`. `0.0` for an empty series.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() as i64 - 1;
    let rank = (sorted.len() as f64 * p / 100.0).ceil() as i64 - 1;
    sorted[rank.clamp(0, last) as usize]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Summary of one metric series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
}

impl Distribution {
    pub fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: mean(&sorted),
            median: percentile_sorted(&sorted, 50.0),
            p95: percentile_sorted(&sorted, 95.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodecStatistics {
    pub codec: CodecId,
    /// Items that had this codec in their algorithm set.
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
    pub total_compressed_bytes: u64,
    /// `original - compressed` summed over successes; negative when the codec
    /// expanded its inputs overall.
    pub total_bytes_saved: i64,
    pub ratio: Distribution,
    pub time_ms: Distribution,
}

impl CodecStatistics {
    fn empty(codec: CodecId) -> Self {
        Self {
            codec,
            attempts: 0,
            successes: 0,
            failures: 0,
            total_compressed_bytes: 0,
            total_bytes_saved: 0,
            ratio: Distribution::default(),
            time_ms: Distribution::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub total_items: usize,
    pub ok_items: usize,
    pub partial_items: usize,
    pub failed_items: usize,
    /// `(ok + partial) / total`, `0.0` for an empty batch.
    pub success_rate: f64,
    pub total_original_bytes: u64,
    /// One entry per codec, in order of first appearance in the batch.
    pub codecs: Vec<CodecStatistics>,
}

impl BatchStatistics {
    pub fn codec(&self, codec: CodecId) -> Option<&CodecStatistics> {
        self.codecs.iter().find(|c| c.codec == codec)
    }

    /// Mean ratio for `codec`, `0.0` when it never succeeded.
    pub fn mean_ratio(&self, codec: CodecId) -> f64 {
        self.codec(codec).map_or(0.0, |c| c.ratio.mean)
    }

    pub fn total_bytes_saved(&self) -> i64 {
        self.codecs.iter().map(|c| c.total_bytes_saved).sum()
    }
}

struct Accumulator {
    stats: CodecStatistics,
    ratios: Vec<f64>,
    times: Vec<f64>,
}

pub(crate) fn summarize(batch: &BatchResult) -> BatchStatistics {
    let mut ok_items = 0;
    let mut partial_items = 0;
    let mut failed_items = 0;
    let mut total_original_bytes = 0u64;
    let mut accumulators: Vec<Accumulator> = Vec::new();

    for item in batch {
        match item.status() {
            ItemStatus::Ok => ok_items += 1,
            ItemStatus::Partial => partial_items += 1,
            ItemStatus::Failed => failed_items += 1,
        }
        total_original_bytes += item.original_size();

        for (codec, outcome) in item.outcomes() {
            let slot = match accumulators.iter().position(|a| a.stats.codec == codec) {
                Some(i) => i,
                None => {
                    accumulators.push(Accumulator {
                        stats: CodecStatistics::empty(codec),
                        ratios: Vec::new(),
                        times: Vec::new(),
                    });
                    accumulators.len() - 1
                }
            };
            let acc = &mut accumulators[slot];
            acc.stats.attempts += 1;
            match outcome {
                Outcome::Success { bytes, elapsed } => {
                    let size = bytes.len() as u64;
                    acc.stats.successes += 1;
                    acc.stats.total_compressed_bytes += size;
                    acc.stats.total_bytes_saved += item.original_size() as i64 - size as i64;
                    if item.original_size() > 0 {
                        acc.ratios.push(size as f64 / item.original_size() as f64);
                    }
                    acc.times.push(elapsed.as_nanos() as f64 / 1_000_000.0);
                }
                Outcome::Failure(_) => acc.stats.failures += 1,
            }
        }
    }

    let total_items = batch.len();
    let success_rate = if total_items == 0 {
        0.0
    } else {
        (ok_items + partial_items) as f64 / total_items as f64
    };

    BatchStatistics {
        total_items,
        ok_items,
        partial_items,
        failed_items,
        success_rate,
        total_original_bytes,
        codecs: accumulators
            .into_iter()
            .map(|a| CodecStatistics {
                ratio: Distribution::of(&a.ratios),
                time_ms: Distribution::of(&a.times),
                ..a.stats
            })
            .collect(),
    }
}
