//! Multi-codec precompression: run payloads through several codecs, inspect
//! the results, pick a variant per request and write variants to disk.

pub mod algorithms;
pub mod codec;
pub mod engine;
pub mod error;
pub mod hash;
pub mod item;
pub mod negotiate;
pub mod registry;
pub mod result;
pub mod stats;
pub mod writer;

pub use algorithms::AlgorithmSet;
pub use codec::{Codec, CodecError};
pub use engine::{BatchOptions, Engine};
pub use error::{Error, ErrorKind, Result, WriteDiagnostics};
pub use hash::{fast_id, FastHasher, HashAlgorithm};
pub use item::{DataSource, Item};
pub use negotiate::{parse_accept_encoding, Negotiator, Preference};
pub use registry::{CodecDescriptor, CodecId, CodecRegistry};
pub use result::{BatchResult, Failure, ItemResult, ItemStatus, Outcome};
pub use stats::{BatchStatistics, CodecStatistics, Distribution};
pub use writer::{DurableWriter, OverwritePolicy, WriteEntry, WriteOptions, WriteReport, WriteStatus};
