use crate::core::chunk_id::ChunkId;
use std::fmt::{self, Display, Formatter};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("File is too big to be uploaded ({size} bytes, limit {limit} bytes)")]
    FileTooBig { size: u64, limit: u64 },
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("Chunk size of {size} bytes exceeds the limit of {limit} bytes")]
    ChunkTooLarge { size: usize, limit: usize },
    #[error("A file of the maximum size needs {chunks} chunks, a manifest holds at most {limit}")]
    ManifestTooLarge { chunks: u64, limit: usize },
    #[error("Unwanted chunk. The manifest has no chunk at index {0}")]
    UnwantedChunk(u64),
    #[error("Hash mismatch between manifest and chunk {expected} at index {index}")]
    ChunkHashMismatch { expected: ChunkId, index: u64 },
    #[error("File was not reassembled completely: {received} of {expected} chunks")]
    MissingChunks { received: usize, expected: usize },
}

///
/// An immutable byte range of a file, named by its content and position.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub sequence_index: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(data: Vec<u8>, sequence_index: u64) -> Self {
        Chunk {
            id: ChunkId::from_chunk(&data, sequence_index),
            sequence_index,
            data,
        }
    }
}

///
/// A file as the coordinator knows it: a name and its ordered chunk ids.
///
#[derive(Debug, Clone, PartialEq)]
pub struct FileManifest {
    pub name: String,
    pub chunks: Vec<ChunkId>,
}

impl FileManifest {
    pub fn from_chunks(name: impl Into<String>, chunks: &[Chunk]) -> Self {
        FileManifest {
            name: name.into(),
            chunks: chunks.iter().map(|chunk| chunk.id).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Display for FileManifest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} chunks)", self.name, self.chunks.len())
    }
}
