use crate::core::chunk_id::ChunkId;
use crate::networking::codec::NetworkError;
use crate::networking::message_dispatcher::MessageDispatcher;
use crate::networking::messages::{RequestType, ResponseType, Status};
use crate::networking::node_info::StorageNodeRecord;
use crate::networking::tcp_listener::RequestHandler;
use crate::storage::chunk_store::{ChunkStore, ChunkStoreError};
use log::{debug, error, info, warn};
use std::time::Instant;

///
/// # Storage node service.
///
/// Serves `PutChunk` and `GetChunk` from a local [`ChunkStore`]. Local failures are turned into
/// typed statuses and never fault the connection.
///
pub struct StorageNode {
    chunk_store: ChunkStore,
}

impl StorageNode {
    pub fn new(chunk_store: ChunkStore) -> Self {
        StorageNode { chunk_store }
    }

    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunk_store
    }

    ///
    /// Handles `PutChunk`. `version` is accepted for wire compatibility; duplicate writes are
    /// last-write-wins.
    ///
    pub fn put_chunk(&self, chunk_id: ChunkId, data: Vec<u8>, version: u64) -> ResponseType {
        let start_time = Instant::now();
        debug!("Storing chunk {} version {}", chunk_id.short(), version);

        match self.chunk_store.put(&chunk_id, &data) {
            Ok(()) => {
                info!(
                    "Stored chunk {}... ({:.2}KB, {:.2}ms)",
                    chunk_id.short(),
                    data.len() as f64 / 1024.0,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                ResponseType::ack_ok("Chunk stored")
            }
            Err(e) => {
                error!("Error storing chunk {}: {}", chunk_id.short(), e);
                ResponseType::ack_error(e.to_string())
            }
        }
    }

    /// Handles `GetChunk`.
    pub fn get_chunk(&self, chunk_id: ChunkId) -> ResponseType {
        let start_time = Instant::now();

        match self.chunk_store.get(&chunk_id) {
            Ok(data) => {
                info!(
                    "Retrieved chunk {}... ({:.2}KB, {:.2}ms)",
                    chunk_id.short(),
                    data.len() as f64 / 1024.0,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                ResponseType::Chunk {
                    status: Status::Ok,
                    data,
                    message: String::new(),
                }
            }
            Err(ChunkStoreError::NotFound(_)) => {
                warn!("Chunk not found: {}...", chunk_id.short());
                ResponseType::chunk_miss(Status::NotFound, "Chunk not found")
            }
            Err(e) => {
                error!("Error retrieving chunk {}: {}", chunk_id.short(), e);
                ResponseType::chunk_miss(Status::Error, e.to_string())
            }
        }
    }
}

impl RequestHandler for StorageNode {
    fn handle(&self, request: RequestType) -> ResponseType {
        match request {
            RequestType::PutChunk {
                chunk_id,
                data,
                version,
            } => self.put_chunk(chunk_id, data, version),
            RequestType::GetChunk { chunk_id } => self.get_chunk(chunk_id),
            other => {
                warn!("Storage node received a coordinator request: {}", other);
                ResponseType::Error {
                    message: format!("Storage node does not serve {}", other),
                }
            }
        }
    }
}

///
/// Announces this node to the coordinator so it becomes eligible for placement.
///
pub async fn register_with_coordinator(
    dispatcher: &MessageDispatcher,
    coordinator_address: &str,
    record: &StorageNodeRecord,
) -> Result<(), NetworkError> {
    let response = dispatcher
        .send_request(
            coordinator_address,
            RequestType::RegisterNode {
                host: record.host.clone(),
                port: record.port,
                node_id: record.node_id.clone(),
            },
        )
        .await?;

    match response {
        ResponseType::Ack {
            status: Status::Ok, ..
        } => {
            info!("Node '{}' registered with coordinator", record.node_id);
            Ok(())
        }
        ResponseType::Ack { message, .. } | ResponseType::Error { message } => {
            Err(NetworkError::Remote(message))
        }
        other => Err(NetworkError::UnexpectedResponse(other.to_string())),
    }
}
