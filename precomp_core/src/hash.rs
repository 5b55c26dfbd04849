//! Short, stable identifiers for dedup and log keys. Not cryptographic.

use std::fmt;

#[cfg(feature = "xxh64")]
use xxhash_rust::xxh64::xxh64;
#[cfg(feature = "xxh3")]
use xxhash_rust::xxh3::xxh3_64;

/// Hash primitives in default preference order, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Xxh3,
    Xxh64,
    /// Always compiled in.
    Fnv1a,
}

impl HashAlgorithm {
    pub const PREFERENCE: [HashAlgorithm; 3] =
        [HashAlgorithm::Xxh3, HashAlgorithm::Xxh64, HashAlgorithm::Fnv1a];

    pub fn is_available(self) -> bool {
        match self {
            HashAlgorithm::Xxh3 => cfg!(feature = "xxh3"),
            HashAlgorithm::Xxh64 => cfg!(feature = "xxh64"),
            HashAlgorithm::Fnv1a => true,
        }
    }

    /// `None` when the primitive is not compiled into this build.
    #[allow(unreachable_patterns)]
    fn digest(self, input: &[u8]) -> Option<u64> {
        match self {
            #[cfg(feature = "xxh3")]
            HashAlgorithm::Xxh3 => Some(xxh3_64(input)),
            #[cfg(feature = "xxh64")]
            HashAlgorithm::Xxh64 => Some(xxh64(input, 0)),
            HashAlgorithm::Fnv1a => Some(fnv1a_64(input)),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Xxh3 => "xxh3-64",
            HashAlgorithm::Xxh64 => "xxh64",
            HashAlgorithm::Fnv1a => "fnv1a-64",
        })
    }
}

fn fnv1a_64(input: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    input
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

/// Hasher bound to the first available primitive of a preference list.
#[derive(Debug, Clone, Copy)]
pub struct FastHasher {
    algorithm: HashAlgorithm,
}

impl FastHasher {
    pub fn new() -> Self {
        Self::with_preferences(&HashAlgorithm::PREFERENCE)
    }

    /// Picks the first available entry, falling back to FNV-1a when none is.
    pub fn with_preferences(preferences: &[HashAlgorithm]) -> Self {
        let algorithm = preferences
            .iter()
            .copied()
            .find(|a| a.is_available())
            .unwrap_or(HashAlgorithm::Fnv1a);
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// 16 lowercase hex characters.
    pub fn id(&self, input: &[u8]) -> String {
        let value = self
            .algorithm
            .digest(input)
            .unwrap_or_else(|| fnv1a_64(input));
        format!("{:016x}", value)
    }
}

impl Default for FastHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// [`FastHasher::id`] with the default preference list.
pub fn fast_id(input: &[u8]) -> String {
    FastHasher::new().id(input)
}
