use crate::core::chunk_id::ChunkId;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkStoreError {
    #[error("Chunk {0} not found in storage")]
    NotFound(ChunkId),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

///
/// Chunk objects on local disk: one file per chunk id directly under the storage root,
/// named by the id's hex form and holding the raw chunk bytes.
///
pub struct ChunkStore {
    storage_root_path: PathBuf,
}

impl ChunkStore {
    /// Opens a store rooted at `storage_root_path`, creating the directory if needed.
    pub fn new(storage_root_path: PathBuf) -> Result<ChunkStore, ChunkStoreError> {
        fs::create_dir_all(&storage_root_path).map_err(|source| ChunkStoreError::Io {
            path: storage_root_path.clone(),
            source,
        })?;
        Ok(ChunkStore { storage_root_path })
    }

    pub fn root(&self) -> &Path {
        &self.storage_root_path
    }

    ///
    /// Writes `data` under `chunk_id`, replacing any previous object.
    ///
    /// Every write goes to its own temporary file in the root and is renamed into place, so a
    /// reader never observes a half-written chunk and concurrent writers of one id do not
    /// interfere.
    ///
    pub fn put(&self, chunk_id: &ChunkId, data: &[u8]) -> Result<(), ChunkStoreError> {
        let chunk_full_path = self.chunk_path(chunk_id);
        let io_error = |source: io::Error| ChunkStoreError::Io {
            path: chunk_full_path.clone(),
            source,
        };

        let mut temp_file = NamedTempFile::new_in(&self.storage_root_path).map_err(io_error)?;
        temp_file.write_all(data).map_err(io_error)?;
        temp_file.as_file().sync_all().map_err(io_error)?;
        temp_file
            .persist(&chunk_full_path)
            .map_err(|e| io_error(e.error))?;
        Ok(())
    }

    /// Reads the bytes stored under `chunk_id`.
    pub fn get(&self, chunk_id: &ChunkId) -> Result<Vec<u8>, ChunkStoreError> {
        let chunk_full_path = self.chunk_path(chunk_id);
        fs::read(&chunk_full_path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ChunkStoreError::NotFound(*chunk_id),
            _ => ChunkStoreError::Io {
                path: chunk_full_path,
                source,
            },
        })
    }

    /// Check if chunk is already stored.
    pub fn contains(&self, chunk_id: &ChunkId) -> bool {
        self.chunk_path(chunk_id).is_file()
    }

    fn chunk_path(&self, chunk_id: &ChunkId) -> PathBuf {
        self.storage_root_path.join(chunk_id.to_string())
    }
}
