use super::common::*;
use crate::constants::{CHUNK_SIZE_B, MAX_CHUNK_SIZE_B, MAX_FILE_SIZE_MB, MAX_MANIFEST_CHUNKS};
use log::info;
use std::path::Path;
use std::time::Instant;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader as TokioBufReader};

///
/// Splits files into ordered, content-addressed chunks.
///
/// The whole file is chunked in memory before any network call is made.
///
pub struct FileSplitter {
    chunk_size: usize,
    max_file_size_mb: usize,
}

impl Default for FileSplitter {
    fn default() -> Self {
        FileSplitter {
            chunk_size: CHUNK_SIZE_B,
            max_file_size_mb: MAX_FILE_SIZE_MB,
        }
    }
}

impl FileSplitter {
    ///
    /// Fails unless a chunk and the manifest of a largest allowed file each fit in one frame.
    ///
    pub fn new(chunk_size: usize, max_file_size_mb: usize) -> Result<Self, ShardingError> {
        if chunk_size == 0 {
            return Err(ShardingError::InvalidChunkSize);
        }
        if chunk_size > MAX_CHUNK_SIZE_B {
            return Err(ShardingError::ChunkTooLarge {
                size: chunk_size,
                limit: MAX_CHUNK_SIZE_B,
            });
        }
        let max_chunks = (max_file_size_mb as u64 * 1024 * 1024).div_ceil(chunk_size as u64);
        if max_chunks > MAX_MANIFEST_CHUNKS as u64 {
            return Err(ShardingError::ManifestTooLarge {
                chunks: max_chunks,
                limit: MAX_MANIFEST_CHUNKS,
            });
        }
        Ok(FileSplitter {
            chunk_size,
            max_file_size_mb,
        })
    }

    ///
    /// Reads `file_path` in fixed windows and returns its chunks in file order.
    /// An empty file yields no chunks.
    ///
    pub async fn split(&self, file_path: &Path) -> Result<Vec<Chunk>, ShardingError> {
        let start_time = Instant::now();
        let file = TokioFile::open(file_path).await?;
        let file_size = file.metadata().await?.len();
        let limit = (self.max_file_size_mb as u64) * 1024 * 1024;
        if file_size > limit {
            return Err(ShardingError::FileTooBig {
                size: file_size,
                limit,
            });
        }

        let chunks = self.split_reader(TokioBufReader::new(file)).await?;
        info!(
            "Chunked file into {} pieces ({:.2}KB total, {:.2}ms)",
            chunks.len(),
            file_size as f64 / 1024.0,
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(chunks)
    }

    pub async fn split_reader<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
    ) -> Result<Vec<Chunk>, ShardingError> {
        let mut chunks = Vec::new();
        loop {
            let window = read_window(&mut reader, self.chunk_size).await?;
            if window.is_empty() {
                break;
            }
            let short = window.len() < self.chunk_size;
            chunks.push(Chunk::new(window, chunks.len() as u64));
            if short {
                break;
            }
        }
        Ok(chunks)
    }
}

/// Fills up to `size` bytes; only a reader at end of file returns fewer.
async fn read_window<R: AsyncRead + Unpin>(
    reader: &mut R,
    size: usize,
) -> Result<Vec<u8>, ShardingError> {
    let mut buffer = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let bytes_read = reader.read(&mut buffer[filled..]).await?;
        if bytes_read == 0 {
            break;
        }
        filled += bytes_read;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

/// Concatenates chunk payloads in sequence order.
pub fn concatenate(chunks: &[Chunk]) -> Vec<u8> {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|chunk| chunk.sequence_index);
    ordered
        .into_iter()
        .flat_map(|chunk| chunk.data.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk_id::ChunkId;
    use crate::utils::testing::{create_test_file_empty, create_test_file_rng_filled};

    #[tokio::test]
    async fn test_split_150kb_into_three_chunks() {
        let file_size = 150 * 1024;
        let (file_path, _dir) = create_test_file_rng_filled(file_size).await;
        let chunks = FileSplitter::default().split(&file_path).await.unwrap();

        let sizes: Vec<usize> = chunks.iter().map(|chunk| chunk.data.len()).collect();
        assert_eq!(sizes, vec![64 * 1024, 64 * 1024, 22 * 1024]);
        let indices: Vec<u64> = chunks.iter().map(|chunk| chunk.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_split_then_concatenate_reproduces_file() {
        for file_size in [1, 1000, CHUNK_SIZE_B - 1, CHUNK_SIZE_B, CHUNK_SIZE_B + 1, 300_000] {
            let (file_path, _dir) = create_test_file_rng_filled(file_size).await;
            let original = tokio::fs::read(&file_path).await.unwrap();
            let chunks = FileSplitter::default().split(&file_path).await.unwrap();
            assert_eq!(concatenate(&chunks), original, "size {}", file_size);
        }
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let (file_path, _dir) = create_test_file_rng_filled(2 * CHUNK_SIZE_B).await;
        let chunks = FileSplitter::default().split(&file_path).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.data.len() == CHUNK_SIZE_B));
    }

    #[tokio::test]
    async fn test_split_empty_file_yields_no_chunks() {
        let (file_path, _dir) = create_test_file_empty().await;
        let chunks = FileSplitter::default().split(&file_path).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_ids_follow_content_and_position() {
        let splitter = FileSplitter::new(4, 1).unwrap();
        let chunks = splitter.split_reader(&b"abcdabcdab"[..]).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data, chunks[1].data);
        assert_ne!(chunks[0].id, chunks[1].id);
        assert_eq!(chunks[2].id, ChunkId::from_chunk(b"ab", 2));
    }

    #[tokio::test]
    async fn test_split_is_repeatable() {
        let (file_path, _dir) = create_test_file_rng_filled(100_000).await;
        let first = FileSplitter::default().split(&file_path).await.unwrap();
        let second = FileSplitter::default().split(&file_path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_file_too_big() {
        let max_file_size_mb = 1;
        let (file_path, _dir) =
            create_test_file_rng_filled(max_file_size_mb * 1024 * 1024 + 1).await;
        let splitter = FileSplitter::new(CHUNK_SIZE_B, max_file_size_mb).unwrap();
        let result = splitter.split(&file_path).await;
        assert!(
            matches!(result, Err(ShardingError::FileTooBig { .. })),
            "Expected ShardingError::FileTooBig, got: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        assert!(matches!(
            FileSplitter::new(0, MAX_FILE_SIZE_MB),
            Err(ShardingError::InvalidChunkSize)
        ));
    }

    #[test]
    fn test_chunk_larger_than_a_frame_is_rejected() {
        assert!(FileSplitter::new(MAX_CHUNK_SIZE_B, 1).is_ok());
        assert!(matches!(
            FileSplitter::new(9 * 1024 * 1024, 64),
            Err(ShardingError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn test_manifest_larger_than_a_frame_is_rejected() {
        assert!(FileSplitter::new(CHUNK_SIZE_B, MAX_FILE_SIZE_MB).is_ok());
        assert!(FileSplitter::new(16 * 1024, 1024).is_ok());
        let result = FileSplitter::new(16 * 1024, MAX_FILE_SIZE_MB);
        assert!(
            matches!(result, Err(ShardingError::ManifestTooLarge { chunks: 262_144, .. })),
            "Expected ShardingError::ManifestTooLarge, got: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_concatenate_orders_by_sequence_index() {
        let chunks = vec![Chunk::new(b"world".to_vec(), 1), Chunk::new(b"hello ".to_vec(), 0)];
        assert_eq!(concatenate(&chunks), b"hello world".to_vec());
    }
}
