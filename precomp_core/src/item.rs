use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::algorithms::AlgorithmSet;
use crate::hash::fast_id;

/// Where an item's bytes come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    InMemory(Vec<u8>),
    /// Read in full when the item is compressed; the size comes from file
    /// metadata so a size ceiling can be enforced without reading.
    File(PathBuf),
}

impl DataSource {
    pub fn size(&self) -> io::Result<u64> {
        match self {
            DataSource::InMemory(bytes) => Ok(bytes.len() as u64),
            DataSource::File(path) => Ok(fs::metadata(path)?.len()),
        }
    }

    pub fn read(self) -> io::Result<Vec<u8>> {
        match self {
            DataSource::InMemory(bytes) => Ok(bytes),
            DataSource::File(path) => fs::read(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            DataSource::InMemory(_) => None,
            DataSource::File(path) => Some(path),
        }
    }
}

impl From<Vec<u8>> for DataSource {
    fn from(bytes: Vec<u8>) -> Self {
        DataSource::InMemory(bytes)
    }
}

impl From<&[u8]> for DataSource {
    fn from(bytes: &[u8]) -> Self {
        DataSource::InMemory(bytes.to_vec())
    }
}

impl From<PathBuf> for DataSource {
    fn from(path: PathBuf) -> Self {
        DataSource::File(path)
    }
}

/// One payload plus the codecs to run it through.
#[derive(Debug, Clone)]
pub struct Item {
    id: String,
    source: DataSource,
    algorithms: AlgorithmSet,
}

impl Item {
    pub fn new(id: impl Into<String>, source: impl Into<DataSource>, algorithms: AlgorithmSet) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            algorithms,
        }
    }

    /// Derive the id from a fast hash: of the content for in-memory data, of
    /// the path for files.
    pub fn keyed(source: impl Into<DataSource>, algorithms: AlgorithmSet) -> Self {
        let source = source.into();
        let id = match &source {
            DataSource::InMemory(bytes) => fast_id(bytes),
            DataSource::File(path) => fast_id(path.to_string_lossy().as_bytes()),
        };
        Self {
            id,
            source,
            algorithms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn algorithms(&self) -> &AlgorithmSet {
        &self.algorithms
    }

    pub(crate) fn into_parts(self) -> (String, DataSource, AlgorithmSet) {
        (self.id, self.source, self.algorithms)
    }
}
