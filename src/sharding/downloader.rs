use super::common::*;
use crate::core::chunk_id::ChunkId;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File as TokioFile};
use tokio::io::{AsyncWriteExt, BufWriter as TokioBufWriter};
use uuid::Uuid;

///
/// Reassembles a file from its chunks, which must arrive in manifest order.
///
/// Bytes are written to a uniquely named `.part` sibling of the destination and only renamed
/// into place by [`FileDownloader::finish`], so a failed download never leaves a truncated file
/// behind under the requested name and concurrent downloads to one destination stay separate.
///
pub struct FileDownloader {
    file_writer: TokioBufWriter<TokioFile>,
    expected_chunks: Vec<ChunkId>,
    chunk_index: usize,
    verify_chunks: bool,
    destination: PathBuf,
    part_path: PathBuf,
}

impl FileDownloader {
    pub async fn new(
        expected_chunks: Vec<ChunkId>,
        destination: &Path,
        verify_chunks: bool,
    ) -> Result<Self, ShardingError> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let part_path = part_path_for(destination);
        let file = TokioFile::create(&part_path).await?;
        Ok(FileDownloader {
            file_writer: TokioBufWriter::new(file),
            expected_chunks,
            chunk_index: 0,
            verify_chunks,
            destination: destination.to_path_buf(),
            part_path,
        })
    }

    /// Id and sequence index of the chunk expected next, if any.
    pub fn next_expected(&self) -> Option<(u64, ChunkId)> {
        self.expected_chunks
            .get(self.chunk_index)
            .map(|chunk_id| (self.chunk_index as u64, *chunk_id))
    }

    ///
    /// Checks `data` against the expected id (when verification is on) without consuming it.
    ///
    pub fn verify(&self, data: &[u8]) -> Result<(), ShardingError> {
        let (index, expected) = self
            .next_expected()
            .ok_or(ShardingError::UnwantedChunk(self.chunk_index as u64))?;
        if self.verify_chunks && !expected.matches(data, index) {
            return Err(ShardingError::ChunkHashMismatch { expected, index });
        }
        Ok(())
    }

    pub async fn store_next_chunk(&mut self, data: &[u8]) -> Result<(), ShardingError> {
        self.verify(data)?;
        self.file_writer.write_all(data).await?;
        self.chunk_index += 1;
        Ok(())
    }

    ///
    /// Flushes and moves the reassembled file to its destination.
    /// Fails with `MissingChunks` if the manifest was not fully consumed.
    ///
    pub async fn finish(mut self) -> Result<PathBuf, ShardingError> {
        if self.chunk_index != self.expected_chunks.len() {
            let error = ShardingError::MissingChunks {
                received: self.chunk_index,
                expected: self.expected_chunks.len(),
            };
            self.abort().await;
            return Err(error);
        }
        self.file_writer.flush().await?;
        self.file_writer.get_ref().sync_all().await?;

        let FileDownloader {
            file_writer,
            destination,
            part_path,
            ..
        } = self;
        drop(file_writer);
        fs::rename(&part_path, &destination).await?;
        Ok(destination)
    }

    /// Discards the partially written file.
    pub async fn abort(self) {
        drop(self.file_writer);
        let _ = fs::remove_file(&self.part_path).await;
    }
}

fn part_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    destination.with_file_name(name)
}
