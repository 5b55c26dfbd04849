use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::error::{Error, ErrorKind, Result};
use crate::item::Item;
use crate::registry::{CodecId, CodecRegistry};
use crate::result::{BatchResult, Failure, ItemResult, ItemStatus, Outcome};

/// Batch-wide behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Abort on the first failed item instead of recording it.
    pub fail_fast: bool,
    /// Reject items larger than this before any codec runs.
    pub max_bytes: Option<u64>,
    /// Compress items concurrently on the rayon pool.
    pub parallel: bool,
    /// Decode every output and compare it with the input.
    pub verify: bool,
}

/// Runs items through their configured codecs.
///
/// Codec failures are isolated: an unavailable or failing codec becomes a
/// `Failure` outcome and never prevents the item's other codecs from running.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<CodecRegistry>,
    options: BatchOptions,
}

impl Engine {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self::with_options(registry, BatchOptions::default())
    }

    pub fn with_options(registry: Arc<CodecRegistry>, options: BatchOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Compress one item through every codec in its algorithm set.
    ///
    /// Returns `Err` only for item-wide failures detected before any codec
    /// runs (size ceiling, unreadable source).
    pub fn compress(&self, item: Item) -> Result<ItemResult> {
        let (id, source, algorithms) = item.into_parts();

        let size = source.size().map_err(|source| Error::SourceReadFailed {
            item: id.clone(),
            source,
        })?;
        if let Some(limit) = self.options.max_bytes {
            if size > limit {
                return Err(Error::PayloadTooLarge {
                    item: id,
                    size,
                    limit,
                });
            }
        }
        let data = source.read().map_err(|source| Error::SourceReadFailed {
            item: id.clone(),
            source,
        })?;

        let outcomes = algorithms
            .iter()
            .map(|(codec, level)| (codec, self.run_codec(&id, codec, level, &data)))
            .collect();
        let result = ItemResult::new(id, data.len() as u64, outcomes);
        log::debug!("item '{}': {:?}", result.id(), result.status());
        Ok(result)
    }

    fn run_codec(&self, item: &str, id: CodecId, level: i32, data: &[u8]) -> Outcome {
        let Some(codec) = self.registry.codec(id) else {
            log::debug!("item '{}': {} unavailable, skipping", item, id);
            return Outcome::Failure(Failure::new(
                ErrorKind::AlgorithmUnavailable,
                format!("codec {} is not available in this build", id),
            ));
        };

        let t0 = Instant::now();
        let encoded = codec.encode(data, level);
        let elapsed = t0.elapsed();

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(err) => return Outcome::Failure(codec_failure(id, err)),
        };
        log::debug!(
            "item '{}': {}@{} {} -> {} bytes in {:?}",
            item,
            id,
            level,
            data.len(),
            bytes.len(),
            elapsed
        );

        if self.options.verify {
            match codec.decode(&bytes) {
                Ok(roundtrip) if roundtrip == data => {}
                Ok(roundtrip) => {
                    return Outcome::Failure(Failure::new(
                        ErrorKind::DecodeFailed,
                        format!(
                            "{} round trip mismatch: {} bytes in, {} bytes back",
                            id,
                            data.len(),
                            roundtrip.len()
                        ),
                    ))
                }
                Err(err) => {
                    return Outcome::Failure(Failure::new(
                        ErrorKind::DecodeFailed,
                        format!("{} verification: {}", id, err),
                    ))
                }
            }
        }

        Outcome::Success { bytes, elapsed }
    }

    /// Compress every item and collect the results in input order.
    ///
    /// With `fail_fast`, the first failed item (in input order) aborts the
    /// batch with its error. Otherwise item-wide errors are recorded as
    /// `Failed` results and the batch always completes.
    pub fn compress_batch(&self, items: Vec<Item>) -> Result<BatchResult> {
        let count = items.len();
        let t0 = Instant::now();

        let compressed: Vec<(String, Result<ItemResult>)> = if self.options.parallel {
            items
                .into_par_iter()
                .map(|item| (item.id().to_string(), self.compress(item)))
                .collect()
        } else {
            let mut out = Vec::with_capacity(count);
            for item in items {
                let id = item.id().to_string();
                let result = self.compress(item);
                let failed = match &result {
                    Ok(r) => r.status() == ItemStatus::Failed,
                    Err(_) => true,
                };
                let abort = self.options.fail_fast && failed;
                out.push((id, result));
                if abort {
                    break;
                }
            }
            out
        };

        let mut batch = BatchResult::new();
        for (id, result) in compressed {
            let result = match result {
                Ok(result) => result,
                Err(err) if self.options.fail_fast => return Err(err),
                Err(err) => {
                    log::warn!("item '{}' failed: {}", id, err);
                    let size = match &err {
                        Error::PayloadTooLarge { size, .. } => *size,
                        _ => 0,
                    };
                    ItemResult::fatal(id, size, Failure::from(&err))
                }
            };
            if self.options.fail_fast && result.status() == ItemStatus::Failed {
                return Err(first_failure(&result));
            }
            if result.status() == ItemStatus::Partial {
                for (codec, failure) in result.failed() {
                    log::warn!("item '{}': {} failed: {}", result.id(), codec, failure.message);
                }
            }
            batch.insert(result)?;
        }

        log::info!(
            "compressed {} item(s) in {:.3}s",
            batch.len(),
            t0.elapsed().as_secs_f64()
        );
        Ok(batch)
    }
}

fn codec_failure(id: CodecId, err: CodecError) -> Failure {
    let kind = match err {
        CodecError::Unavailable(_) => ErrorKind::AlgorithmUnavailable,
        CodecError::EncodeFailed(_) => ErrorKind::EncodeFailed,
        CodecError::DecodeFailed(_) => ErrorKind::DecodeFailed,
    };
    Failure::new(kind, format!("{}: {}", id, err))
}

/// Error describing why a `Failed` item produced nothing.
fn first_failure(result: &ItemResult) -> Error {
    let failure = result
        .fatal_error()
        .or_else(|| result.failed().map(|(_, f)| f).next());
    match failure {
        Some(f) => Error::ItemFailed {
            item: result.id().to_string(),
            kind: f.kind,
            message: f.message.clone(),
        },
        None => Error::ItemFailed {
            item: result.id().to_string(),
            kind: ErrorKind::ItemFailed,
            message: "no codec produced output".to_string(),
        },
    }
}
