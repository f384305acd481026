use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{FsError, FsResult};
use crate::traits::{validate_key, Filesystem};

/// In-memory filesystem.
///
/// Intended for tests and ephemeral servers. Files are byte buffers in a
/// `BTreeMap` behind a `RwLock`; contents are cloned on read and write, so
/// a reader never observes a partially written buffer.
pub struct MemoryFs {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of files currently stored.
    pub fn len(&self) -> usize {
        self.files.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all files.
    pub fn total_bytes(&self) -> u64 {
        self.files
            .read()
            .map(|m| m.values().map(|v| v.len() as u64).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> FsError {
    FsError::Poisoned(e.to_string())
}

impl Filesystem for MemoryFs {
    fn read(&self, key: &str) -> FsResult<Vec<u8>> {
        validate_key(key)?;
        let files = self.files.read().map_err(poisoned)?;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| FsError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, data: &[u8]) -> FsResult<()> {
        validate_key(key)?;
        let mut files = self.files.write().map_err(poisoned)?;
        files.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> FsResult<()> {
        validate_key(key)?;
        let mut files = self.files.write().map_err(poisoned)?;
        files
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| FsError::NotFound(key.to_string()))
    }

    fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl std::fmt::Debug for MemoryFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFs")
            .field("file_count", &self.len())
            .finish()
    }
}
