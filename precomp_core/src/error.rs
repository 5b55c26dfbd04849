use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;

use crate::registry::CodecId;

/// Machine-checkable error code carried by every [`Error`] and every
/// per-codec [`Failure`](crate::result::Failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownCodec,
    AlgorithmUnavailable,
    InvalidLevel,
    EncodeFailed,
    DecodeFailed,
    PayloadTooLarge,
    SourceReadFailed,
    EmptyAlgorithmSet,
    DuplicateItem,
    ItemFailed,
    InvalidBasename,
    TargetExists,
    DirectoryNotWritable,
    DirectoryCreateFailed,
    TempWriteFailed,
    RenameFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Filesystem context attached to writer errors.
///
/// Every field other than `path` is best effort: it is `None` when the
/// information could not be gathered at the time of the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteDiagnostics {
    pub path: PathBuf,
    pub bytes_to_write: Option<u64>,
    pub directory_writable: Option<bool>,
    pub disk_free_space: Option<u64>,
}

impl WriteDiagnostics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for WriteDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path={}", self.path.display())?;
        if let Some(bytes) = self.bytes_to_write {
            write!(f, ", bytes_to_write={}", bytes)?;
        }
        if let Some(writable) = self.directory_writable {
            write!(f, ", directory_writable={}", writable)?;
        }
        if let Some(free) = self.disk_free_space {
            write!(f, ", disk_free_space={}", free)?;
        }
        Ok(())
    }
}

/// Errors surfaced to the immediate caller.
///
/// Per-codec failures during item compression are never raised through this
/// type; they are recorded as data in the item result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown codec '{0}'")]
    UnknownCodec(String),

    #[error("codec {codec} is not available in this build")]
    AlgorithmUnavailable { codec: CodecId },

    #[error("level {level} is out of range for {codec} (allowed {min}..={max})")]
    InvalidLevel {
        codec: CodecId,
        level: i32,
        min: i32,
        max: i32,
    },

    #[error("{codec} encode failed: {message}")]
    EncodeFailed { codec: CodecId, message: String },

    #[error("{codec} decode failed: {message}")]
    DecodeFailed { codec: CodecId, message: String },

    #[error("item '{item}' is {size} bytes, above the {limit} byte ceiling")]
    PayloadTooLarge { item: String, size: u64, limit: u64 },

    #[error("failed to read source of item '{item}': {source}")]
    SourceReadFailed {
        item: String,
        #[source]
        source: io::Error,
    },

    #[error("algorithm set is empty")]
    EmptyAlgorithmSet,

    #[error("duplicate item id '{0}' in batch")]
    DuplicateItem(String),

    #[error("item '{item}' failed ({kind}): {message}")]
    ItemFailed {
        item: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("invalid output basename {0:?}")]
    InvalidBasename(String),

    #[error("target already exists ({0})")]
    TargetExists(WriteDiagnostics),

    #[error("directory is not writable ({diag}): {reason}")]
    DirectoryNotWritable {
        diag: WriteDiagnostics,
        reason: String,
    },

    #[error("failed to create directory ({diag}): {source}")]
    DirectoryCreateFailed {
        diag: WriteDiagnostics,
        #[source]
        source: io::Error,
    },

    #[error("failed to stage temporary file ({diag}): {source}")]
    TempWriteFailed {
        diag: WriteDiagnostics,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename into place ({diag}): {source}")]
    RenameFailed {
        diag: WriteDiagnostics,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownCodec(_) => ErrorKind::UnknownCodec,
            Error::AlgorithmUnavailable { .. } => ErrorKind::AlgorithmUnavailable,
            Error::InvalidLevel { .. } => ErrorKind::InvalidLevel,
            Error::EncodeFailed { .. } => ErrorKind::EncodeFailed,
            Error::DecodeFailed { .. } => ErrorKind::DecodeFailed,
            Error::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Error::SourceReadFailed { .. } => ErrorKind::SourceReadFailed,
            Error::EmptyAlgorithmSet => ErrorKind::EmptyAlgorithmSet,
            Error::DuplicateItem(_) => ErrorKind::DuplicateItem,
            Error::ItemFailed { .. } => ErrorKind::ItemFailed,
            Error::InvalidBasename(_) => ErrorKind::InvalidBasename,
            Error::TargetExists(_) => ErrorKind::TargetExists,
            Error::DirectoryNotWritable { .. } => ErrorKind::DirectoryNotWritable,
            Error::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            Error::TempWriteFailed { .. } => ErrorKind::TempWriteFailed,
            Error::RenameFailed { .. } => ErrorKind::RenameFailed,
        }
    }

    /// Filesystem context for writer errors, `None` for everything else.
    pub fn diagnostics(&self) -> Option<&WriteDiagnostics> {
        match self {
            Error::TargetExists(diag)
            | Error::DirectoryNotWritable { diag, .. }
            | Error::DirectoryCreateFailed { diag, .. }
            | Error::TempWriteFailed { diag, .. }
            | Error::RenameFailed { diag, .. } => Some(diag),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
