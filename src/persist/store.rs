// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Non-volatile blob storage contract with in-memory and file-backed stores.
// Author: Lukas Bower

//! Blob storage for persisted configuration subtrees.
//!
//! Writes become durable on [`ConfigStore::commit`]; callers write, then commit.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::StorageError;

/// Key/value blob store.
///
/// Reads only see committed blobs; staged writes stay invisible until
/// [`ConfigStore::commit`] succeeds for them.
pub trait ConfigStore {
    /// Read the committed blob under `key`, `None` if none was committed.
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stage `value` under `key`.
    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Make staged writes durable.
    ///
    /// A write that could not be committed stays staged for the next call.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Whether any blob was ever committed.
    fn has_blobs(&self) -> Result<bool, StorageError>;
}

/// Volatile store used by tests and simulations.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    committed: BTreeMap<String, Vec<u8>>,
    staged: BTreeMap<String, Vec<u8>>,
    commits: usize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits performed.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Keys with committed blobs, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.committed.keys().map(String::as_str)
    }
}

impl ConfigStore for MemoryStore {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.committed.get(key).cloned())
    }

    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.staged.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.committed.append(&mut self.staged);
        self.commits += 1;
        Ok(())
    }

    fn has_blobs(&self) -> Result<bool, StorageError> {
        Ok(!self.committed.is_empty())
    }
}

const BLOB_EXTENSION: &str = "blob";
const STAGED_EXTENSION: &str = "blob.staged";

/// Store keeping one file per key inside a directory.
///
/// Writes land in a `.blob.staged` file that [`ConfigStore::commit`] renames over
/// the live blob.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    staged: Vec<String>,
}

impl FileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Open {
            location: dir.display().to_string(),
            source,
        })?;
        debug!("config store opened at {}", dir.display());
        Ok(Self {
            dir,
            staged: Vec::new(),
        })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str, extension: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unsupported blob key {key:?}"),
            ));
        }
        Ok(self.dir.join(format!("{key}.{extension}")))
    }
}

impl ConfigStore for FileStore {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let read_err = |source| StorageError::Read {
            key: key.to_owned(),
            source,
        };
        let path = self.blob_path(key, BLOB_EXTENSION).map_err(read_err)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(read_err(err)),
        }
    }

    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            key: key.to_owned(),
            source,
        };
        let path = self.blob_path(key, STAGED_EXTENSION).map_err(write_err)?;
        fs::write(&path, value).map_err(write_err)?;
        trace!("staged {} bytes for {key}", value.len());
        if !self.staged.iter().any(|staged| staged == key) {
            self.staged.push(key.to_owned());
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        while let Some(key) = self.staged.first() {
            let staged = self.dir.join(format!("{key}.{STAGED_EXTENSION}"));
            let live = self.dir.join(format!("{key}.{BLOB_EXTENSION}"));
            fs::rename(&staged, &live).map_err(StorageError::Commit)?;
            self.staged.remove(0);
        }
        Ok(())
    }

    fn has_blobs(&self) -> Result<bool, StorageError> {
        let open_err = |source| StorageError::Open {
            location: self.dir.display().to_string(),
            source,
        };
        for entry in fs::read_dir(&self.dir).map_err(open_err)? {
            let path = entry.map_err(open_err)?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(BLOB_EXTENSION) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_commits_staged_blobs() {
        let mut store = MemoryStore::new();
        assert!(!store.has_blobs().unwrap());
        store.set_blob("general", b"{}").unwrap();
        assert_eq!(store.get_blob("general").unwrap(), None);
        assert!(!store.has_blobs().unwrap());
        store.commit().unwrap();
        assert_eq!(store.get_blob("general").unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(store.has_blobs().unwrap());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["general"]);
        assert_eq!(store.commits(), 1);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("nvs")).unwrap();
        assert!(!store.has_blobs().unwrap());
        assert_eq!(store.get_blob("mqtt").unwrap(), None);

        store.set_blob("mqtt", b"{\"Activate\":true}").unwrap();
        assert_eq!(store.get_blob("mqtt").unwrap(), None);
        assert!(!store.has_blobs().unwrap());
        store.commit().unwrap();
        assert!(store.has_blobs().unwrap());

        let reopened = FileStore::open(dir.path().join("nvs")).unwrap();
        assert_eq!(
            reopened.get_blob("mqtt").unwrap().as_deref(),
            Some(&b"{\"Activate\":true}"[..])
        );
    }

    #[test]
    fn failed_commit_keeps_writes_staged() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set_blob("general", b"{\"MdnsHostname\":\"gw\"}").unwrap();
        store.set_blob("mqtt", b"{\"PubInterval\":5}").unwrap();

        let blocker = dir.path().join("general.blob");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("occupied"), b"x").unwrap();
        assert!(matches!(store.commit(), Err(StorageError::Commit(_))));

        fs::remove_dir_all(&blocker).unwrap();
        store.commit().unwrap();
        assert_eq!(
            store.get_blob("general").unwrap().as_deref(),
            Some(&b"{\"MdnsHostname\":\"gw\"}"[..])
        );
        assert_eq!(
            store.get_blob("mqtt").unwrap().as_deref(),
            Some(&b"{\"PubInterval\":5}"[..])
        );
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set_blob("../escape", b"x"),
            Err(StorageError::Write { .. })
        ));
        assert!(matches!(
            store.get_blob(""),
            Err(StorageError::Read { .. })
        ));
    }

    #[test]
    fn file_store_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileStore::open(file.join("nvs")),
            Err(StorageError::Open { .. })
        ));
    }
}
