use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tiles::BlobId;
use tracing::trace;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob {id} is not in the store")]
    Missing { id: BlobId },
    #[error("blob id {id:?} cannot be used as a file name")]
    InvalidId { id: BlobId },
    #[error("blob store i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persists blob payloads by id.
pub trait BlobStore {
    fn store(&self, id: &BlobId, bytes: &[u8]) -> Result<(), BlobStoreError>;
}

/// Reads back payloads written by a [`BlobStore`].
pub trait BlobLoader {
    fn load(&self, id: &BlobId) -> Result<Vec<u8>, BlobStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(&self, id: &BlobId, bytes: &[u8]) -> Result<(), BlobStoreError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), bytes.to_vec());
        Ok(())
    }
}

impl BlobLoader for MemoryBlobStore {
    fn load(&self, id: &BlobId) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| BlobStoreError::Missing { id: id.clone() })
    }
}

/// One `<id>.data` file per blob inside a directory.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, BlobStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| BlobStoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &BlobId) -> Result<PathBuf, BlobStoreError> {
        let name = id.as_str();
        let usable = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !usable {
            return Err(BlobStoreError::InvalidId { id: id.clone() });
        }
        Ok(self.root.join(format!("{name}.data")))
    }
}

impl BlobStore for DirectoryBlobStore {
    fn store(&self, id: &BlobId, bytes: &[u8]) -> Result<(), BlobStoreError> {
        let path = self.path_for(id)?;
        fs::write(&path, bytes).map_err(|source| BlobStoreError::Io {
            path: path.clone(),
            source,
        })?;
        trace!(%id, bytes = bytes.len(), path = %path.display(), "blob written");
        Ok(())
    }
}

impl BlobLoader for DirectoryBlobStore {
    fn load(&self, id: &BlobId) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.path_for(id)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => BlobStoreError::Missing { id: id.clone() },
            _ => BlobStoreError::Io { path, source },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_and_reports_missing() {
        let store = MemoryBlobStore::new();
        let id = BlobId::from("tile-a");
        store.store(&id, b"bar").expect("store blob");
        assert_eq!(store.load(&id).expect("load blob"), b"bar");
        assert!(store.contains(&id));
        assert!(matches!(
            store.load(&BlobId::from("tile-b")),
            Err(BlobStoreError::Missing { .. })
        ));
    }

    #[test]
    fn directory_store_writes_one_data_file_per_blob() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = DirectoryBlobStore::create(dir.path().join("blobs")).expect("create store");
        let id = BlobId::from("0b5e");
        store.store(&id, b"bar").expect("store blob");

        let path = dir.path().join("blobs").join("0b5e.data");
        assert_eq!(fs::read(&path).expect("read blob file"), b"bar");
        assert_eq!(store.load(&id).expect("load blob"), b"bar");
    }

    #[test]
    fn directory_store_maps_absent_files_to_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = DirectoryBlobStore::create(dir.path()).expect("create store");
        assert!(matches!(
            store.load(&BlobId::from("absent")),
            Err(BlobStoreError::Missing { .. })
        ));
    }

    #[test]
    fn ids_that_escape_the_directory_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = DirectoryBlobStore::create(dir.path()).expect("create store");
        for id in ["", "..", "../outside", "nested/id"] {
            assert!(
                matches!(
                    store.store(&BlobId::from(id), b"x"),
                    Err(BlobStoreError::InvalidId { .. })
                ),
                "id {id:?} was accepted"
            );
        }
    }
}
