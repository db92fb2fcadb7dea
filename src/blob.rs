//! Binary payload access for include-binary expressions.
//!
//! The evaluator reads file contents through the [`BlobSource`] trait so
//! tests can supply in-memory payloads and embedders can sandbox file
//! access.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Provider of include-binary payloads.
pub trait BlobSource {
    /// Reads `len` bytes (or everything to the end when `len` is
    /// `None`) starting at `offset` from the named payload.
    fn read(&self, path: &str, offset: u64, len: Option<u64>) -> Result<Vec<u8>>;
}

/// Reads payloads from the filesystem, relative to a root directory.
#[derive(Debug)]
pub struct FsBlobSource {
    root: PathBuf,
}

impl FsBlobSource {
    /// Creates a source rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobSource { root: root.into() }
    }
}

impl BlobSource for FsBlobSource {
    fn read(&self, path: &str, offset: u64, len: Option<u64>) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        let fail = |e: std::io::Error| Error::BlobRead {
            path: path.to_string(),
            reason: e.to_string(),
        };

        let mut file = File::open(&full).map_err(fail)?;
        file.seek(SeekFrom::Start(offset)).map_err(fail)?;

        let mut bytes = Vec::new();
        match len {
            Some(len) => {
                file.take(len).read_to_end(&mut bytes).map_err(fail)?;
            }
            None => {
                file.read_to_end(&mut bytes).map_err(fail)?;
            }
        }
        Ok(bytes)
    }
}

/// In-memory payload map, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemBlobSource {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemBlobSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        MemBlobSource::default()
    }

    /// Registers a payload under the given name.
    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.blobs.insert(path.into(), bytes.into());
    }
}

impl BlobSource for MemBlobSource {
    fn read(&self, path: &str, offset: u64, len: Option<u64>) -> Result<Vec<u8>> {
        let blob = self.blobs.get(path).ok_or_else(|| Error::BlobRead {
            path: path.to_string(),
            reason: "no such payload".to_string(),
        })?;

        let start = (offset as usize).min(blob.len());
        let rest = &blob[start..];
        let take = match len {
            Some(len) => (len as usize).min(rest.len()),
            None => rest.len(),
        };
        Ok(rest[..take].to_vec())
    }
}
