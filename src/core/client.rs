use crate::config::ClientConfig;
use crate::core::chunk_id::ChunkId;
use crate::networking::codec::NetworkError;
use crate::networking::message_dispatcher::MessageDispatcher;
use crate::networking::messages::{RequestType, ResponseType, Status};
use crate::networking::node_info::StorageNodeRecord;
use crate::sharding::common::{Chunk, FileManifest, ShardingError};
use crate::sharding::downloader::FileDownloader;
use crate::sharding::uploader::FileSplitter;
use futures::future::join_all;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Version stamped on every pushed chunk. Storage nodes treat writes as last-write-wins.
const CHUNK_VERSION: u64 = 1;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No storage nodes available for chunk {0}")]
    NoStorageNodes(ChunkId),
    #[error("No known locations for chunk {0}")]
    NoLocations(ChunkId),
    #[error("Failed to fetch chunk {0} from any replica")]
    FetchExhausted(ChunkId),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Chunk {chunk_id} reached {stored} replicas, {required} required")]
    UnderReplicated {
        chunk_id: ChunkId,
        stored: usize,
        required: usize,
    },
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Sharding(#[from] ShardingError),
}

///
/// # Store client.
///
/// Splits files into chunks, asks the coordinator where every chunk goes, moves the bytes to
/// and from storage nodes itself, and announces or fetches the resulting manifests.
///
/// Chunks are transferred one after another. The manifest is only announced once every chunk
/// has been pushed.
///
pub struct Client {
    config: ClientConfig,
    dispatcher: MessageDispatcher,
    splitter: FileSplitter,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let splitter = FileSplitter::new(config.chunk_size, config.max_file_size_mb)?;
        let dispatcher = MessageDispatcher::new(Duration::from_millis(config.request_timeout_ms));
        Ok(Client {
            config,
            dispatcher,
            splitter,
        })
    }

    /// Uploads `file_path` under its base name.
    pub async fn upload(&self, file_path: &Path) -> Result<FileManifest, ClientError> {
        let filename = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ClientError::InvalidFileName(file_path.display().to_string()))?;
        self.upload_as(file_path, filename).await
    }

    ///
    /// Uploads `file_path` under `filename`.
    ///
    /// Aborts without announcing anything when the coordinator has no targets for a chunk or
    /// when a chunk reaches fewer than `min_replicas` nodes. Failed pushes above that floor are
    /// only logged.
    ///
    pub async fn upload_as(
        &self,
        file_path: &Path,
        filename: &str,
    ) -> Result<FileManifest, ClientError> {
        if filename.is_empty() {
            return Err(ClientError::InvalidFileName(filename.to_string()));
        }
        let overall_start = Instant::now();
        info!("Starting upload: {} as {}", file_path.display(), filename);

        let chunks = self.splitter.split(file_path).await?;
        let total_bytes: usize = chunks.iter().map(|chunk| chunk.data.len()).sum();

        let transfer_start = Instant::now();
        let mut replica_count = 0;
        for chunk in &chunks {
            let targets = self.request_put_targets(&chunk.id).await?;
            if targets.is_empty() {
                error!("No storage nodes available for chunk {}", chunk.id.short());
                return Err(ClientError::NoStorageNodes(chunk.id));
            }

            let stored = self.push_to_targets(chunk, &targets).await;
            if stored < self.config.min_replicas {
                error!(
                    "Chunk {} reached {} of {} targets, {} required",
                    chunk.id.short(),
                    stored,
                    targets.len(),
                    self.config.min_replicas
                );
                return Err(ClientError::UnderReplicated {
                    chunk_id: chunk.id,
                    stored,
                    required: self.config.min_replicas,
                });
            }
            replica_count += stored;
        }
        let transfer_elapsed = transfer_start.elapsed();

        let manifest = FileManifest::from_chunks(filename, &chunks);
        self.announce_manifest(&manifest).await?;

        info!("Upload complete: {}", manifest);
        info!(
            "Total time: {:.2}ms (Transfer: {:.2}ms, {} chunks, {:.2}KB, {} replicas written)",
            overall_start.elapsed().as_secs_f64() * 1000.0,
            transfer_elapsed.as_secs_f64() * 1000.0,
            chunks.len(),
            total_bytes as f64 / 1024.0,
            replica_count
        );
        Ok(manifest)
    }

    ///
    /// Downloads `filename` into `destination`.
    ///
    /// Every chunk is read from the first of its candidate nodes that returns it (and, with
    /// verification on, whose bytes hash to the expected id). One unobtainable chunk fails the
    /// whole download and nothing is left at `destination`.
    ///
    pub async fn download(
        &self,
        filename: &str,
        destination: &Path,
    ) -> Result<PathBuf, ClientError> {
        let overall_start = Instant::now();
        info!("Starting download: {}", filename);

        let chunks = match self.get_manifest(filename).await? {
            Some(chunks) => chunks,
            None => {
                warn!("File not found: {}", filename);
                return Err(ClientError::FileNotFound(filename.to_string()));
            }
        };

        info!("Fetching {} chunks...", chunks.len());
        let fetch_start = Instant::now();
        let mut downloader =
            FileDownloader::new(chunks.clone(), destination, self.config.verify_chunks).await?;

        let fetched = self.fetch_chunks(&chunks, &mut downloader).await;
        let written = match fetched {
            Ok(()) => downloader.finish().await?,
            Err(e) => {
                downloader.abort().await;
                return Err(e);
            }
        };

        info!(
            "Download complete: {} -> {}",
            filename,
            written.display()
        );
        info!(
            "Total time: {:.2}ms (Fetch: {:.2}ms, {} chunks)",
            overall_start.elapsed().as_secs_f64() * 1000.0,
            fetch_start.elapsed().as_secs_f64() * 1000.0,
            chunks.len()
        );
        Ok(written)
    }

    /// Every filename known to the coordinator.
    pub async fn list_files(&self) -> Result<Vec<String>, ClientError> {
        match self.coordinator_call(RequestType::ListFiles).await? {
            ResponseType::Files { files } => Ok(files),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_chunks(
        &self,
        chunks: &[ChunkId],
        downloader: &mut FileDownloader,
    ) -> Result<(), ClientError> {
        for chunk_id in chunks {
            let data = self.fetch_first_available(chunk_id, downloader).await?;
            downloader.store_next_chunk(&data).await?;
        }
        Ok(())
    }

    async fn fetch_first_available(
        &self,
        chunk_id: &ChunkId,
        downloader: &FileDownloader,
    ) -> Result<Vec<u8>, ClientError> {
        let targets = self.request_get_targets(chunk_id).await?;
        if targets.is_empty() {
            error!("No known locations for chunk {}", chunk_id.short());
            return Err(ClientError::NoLocations(*chunk_id));
        }

        for node in &targets {
            let data = match self.fetch_chunk(node, chunk_id).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "Failed to fetch chunk {}... from {}: {}",
                        chunk_id.short(),
                        node.address(),
                        e
                    );
                    continue;
                }
            };
            match downloader.verify(&data) {
                Ok(()) => return Ok(data),
                Err(e) => warn!(
                    "Discarding chunk {}... from {}: {}",
                    chunk_id.short(),
                    node.address(),
                    e
                ),
            }
        }

        error!("Failed to fetch chunk {}", chunk_id);
        Err(ClientError::FetchExhausted(*chunk_id))
    }

    /// Pushes `chunk` to every target and returns how many accepted it.
    async fn push_to_targets(&self, chunk: &Chunk, targets: &[StorageNodeRecord]) -> usize {
        let results: Vec<Result<(), ClientError>> = if self.config.parallel_replica_push {
            join_all(targets.iter().map(|node| self.push_chunk(node, chunk))).await
        } else {
            let mut results = Vec::with_capacity(targets.len());
            for node in targets {
                results.push(self.push_chunk(node, chunk).await);
            }
            results
        };

        let mut stored = 0;
        for (node, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => stored += 1,
                Err(e) => warn!(
                    "Failed to push chunk {}... to {}: {}",
                    chunk.id.short(),
                    node.address(),
                    e
                ),
            }
        }
        stored
    }

    async fn push_chunk(&self, node: &StorageNodeRecord, chunk: &Chunk) -> Result<(), ClientError> {
        let start_time = Instant::now();
        let response = self
            .dispatcher
            .send_request(
                &node.address(),
                RequestType::PutChunk {
                    chunk_id: chunk.id,
                    data: chunk.data.clone(),
                    version: CHUNK_VERSION,
                },
            )
            .await?;

        match response {
            ResponseType::Ack {
                status: Status::Ok, ..
            } => {
                info!(
                    "Transferred chunk {}... to {} ({:.2}KB, {:.2}ms)",
                    chunk.id.short(),
                    node.address(),
                    chunk.data.len() as f64 / 1024.0,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                Ok(())
            }
            ResponseType::Ack { message, .. } | ResponseType::Error { message } => {
                Err(ClientError::Rejected(message))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_chunk(
        &self,
        node: &StorageNodeRecord,
        chunk_id: &ChunkId,
    ) -> Result<Vec<u8>, ClientError> {
        let start_time = Instant::now();
        let response = self
            .dispatcher
            .send_request(&node.address(), RequestType::GetChunk { chunk_id: *chunk_id })
            .await?;

        match response {
            ResponseType::Chunk {
                status: Status::Ok,
                data,
                ..
            } => {
                info!(
                    "Fetched chunk {}... from {} ({:.2}KB, {:.2}ms)",
                    chunk_id.short(),
                    node.address(),
                    data.len() as f64 / 1024.0,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                Ok(data)
            }
            ResponseType::Chunk {
                status, message, ..
            } => Err(ClientError::Rejected(format!("{}: {}", status, message))),
            ResponseType::Error { message } => Err(ClientError::Rejected(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn request_put_targets(
        &self,
        chunk_id: &ChunkId,
    ) -> Result<Vec<StorageNodeRecord>, ClientError> {
        match self
            .coordinator_call(RequestType::RequestPutTargets { chunk_id: *chunk_id })
            .await?
        {
            ResponseType::Targets { targets } => Ok(targets),
            other => Err(unexpected(other)),
        }
    }

    async fn request_get_targets(
        &self,
        chunk_id: &ChunkId,
    ) -> Result<Vec<StorageNodeRecord>, ClientError> {
        match self
            .coordinator_call(RequestType::RequestGetTargets { chunk_id: *chunk_id })
            .await?
        {
            ResponseType::Targets { targets } => Ok(targets),
            other => Err(unexpected(other)),
        }
    }

    async fn announce_manifest(&self, manifest: &FileManifest) -> Result<(), ClientError> {
        let request = RequestType::AnnounceManifest {
            filename: manifest.name.clone(),
            chunks: manifest.chunks.clone(),
        };
        match self.coordinator_call(request).await? {
            ResponseType::Ack {
                status: Status::Ok, ..
            } => Ok(()),
            ResponseType::Ack { message, .. } | ResponseType::Error { message } => {
                Err(ClientError::Rejected(message))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn get_manifest(&self, filename: &str) -> Result<Option<Vec<ChunkId>>, ClientError> {
        let request = RequestType::GetManifest {
            filename: filename.to_string(),
        };
        match self.coordinator_call(request).await? {
            ResponseType::Manifest {
                chunks,
                found: true,
            } => Ok(Some(chunks)),
            ResponseType::Manifest { found: false, .. } => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    async fn coordinator_call(&self, request: RequestType) -> Result<ResponseType, ClientError> {
        Ok(self
            .dispatcher
            .send_request(&self.config.coordinator_address, request)
            .await?)
    }
}

fn unexpected(response: ResponseType) -> ClientError {
    match response {
        ResponseType::Error { message } => ClientError::Rejected(message),
        other => ClientError::Network(NetworkError::UnexpectedResponse(other.to_string())),
    }
}
