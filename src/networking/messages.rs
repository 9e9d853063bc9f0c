use crate::core::chunk_id::ChunkId;
use crate::networking::node_info::StorageNodeRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// RequestId type is used to identify request-response pairs.
/// Currently, it is just type alias to Uuid.
pub type RequestId = Uuid;

/// Outcome carried by acknowledgements and chunk reads.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    NotFound,
    Error,
}

/// Request type enum
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub enum RequestType {
    /// `RegisterNode` adds (or refreshes) a storage node in the coordinator's registry.
    RegisterNode {
        host: String,
        port: u16,
        node_id: String,
    },
    /// `RequestPutTargets` asks the coordinator which nodes should receive a chunk.
    RequestPutTargets { chunk_id: ChunkId },
    /// `AnnounceManifest` stores the ordered chunk sequence of a file.
    AnnounceManifest {
        filename: String,
        chunks: Vec<ChunkId>,
    },
    /// `ListFiles` enumerates every announced filename.
    ListFiles,
    /// `GetManifest` returns the chunk sequence of a file.
    GetManifest { filename: String },
    /// `RequestGetTargets` asks the coordinator which nodes are believed to hold a chunk.
    RequestGetTargets { chunk_id: ChunkId },
    /// `PutChunk` writes chunk bytes to a storage node.
    PutChunk {
        chunk_id: ChunkId,
        #[serde(with = "hex_payload")]
        data: Vec<u8>,
        version: u64,
    },
    /// `GetChunk` reads chunk bytes from a storage node.
    GetChunk { chunk_id: ChunkId },
}

/// Response type enum
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub enum ResponseType {
    /// Reply to `RegisterNode`, `AnnounceManifest` and `PutChunk`.
    Ack { status: Status, message: String },
    /// Reply to `RequestPutTargets` and `RequestGetTargets`, in preference order.
    Targets { targets: Vec<StorageNodeRecord> },
    /// Reply to `ListFiles`.
    Files { files: Vec<String> },
    /// Reply to `GetManifest`. `found` separates an unknown filename from an empty file.
    Manifest { chunks: Vec<ChunkId>, found: bool },
    /// Reply to `GetChunk`. `data` is empty unless `status` is `Ok`.
    Chunk {
        status: Status,
        #[serde(with = "hex_payload")]
        data: Vec<u8>,
        message: String,
    },
    /// The request could not be decoded or is not served by this endpoint.
    Error { message: String },
}

impl ResponseType {
    pub fn ack_ok(message: impl Into<String>) -> Self {
        ResponseType::Ack {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn ack_error(message: impl Into<String>) -> Self {
        ResponseType::Ack {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn chunk_miss(status: Status, message: impl Into<String>) -> Self {
        ResponseType::Chunk {
            status,
            data: Vec::new(),
            message: message.into(),
        }
    }
}

///
/// Request struct representing a request message.
///
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Request {
    pub(crate) request_type: RequestType,
    pub(crate) request_id: RequestId,
}

impl Request {
    ///
    /// Default constructor for Request struct.
    ///
    pub fn new(request_type: RequestType) -> Self {
        Request {
            request_type,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_type(&self) -> &RequestType {
        &self.request_type
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

///
/// Represents a response message.
///
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Response {
    pub(crate) response_type: ResponseType,
    pub(crate) request_id: RequestId,
}

impl Response {
    ///
    /// Default constructor for Response struct.
    ///
    pub fn new(response_type: ResponseType, request_id: RequestId) -> Self {
        Response {
            response_type,
            request_id,
        }
    }

    pub fn response_type(&self) -> &ResponseType {
        &self.response_type
    }

    pub fn into_response_type(self) -> ResponseType {
        self.response_type
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::NotFound => write!(f, "not_found"),
            Status::Error => write!(f, "error"),
        }
    }
}

impl Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestType::RegisterNode {
                host,
                port,
                node_id,
            } => write!(f, "RegisterNode({}, {}:{})", node_id, host, port),
            RequestType::RequestPutTargets { chunk_id } => {
                write!(f, "RequestPutTargets({})", chunk_id.short())
            }
            RequestType::AnnounceManifest { filename, chunks } => {
                write!(f, "AnnounceManifest({}, {} chunks)", filename, chunks.len())
            }
            RequestType::ListFiles => write!(f, "ListFiles"),
            RequestType::GetManifest { filename } => write!(f, "GetManifest({})", filename),
            RequestType::RequestGetTargets { chunk_id } => {
                write!(f, "RequestGetTargets({})", chunk_id.short())
            }
            RequestType::PutChunk {
                chunk_id,
                data,
                version,
            } => write!(
                f,
                "PutChunk({}, {} B, v{})",
                chunk_id.short(),
                data.len(),
                version
            ),
            RequestType::GetChunk { chunk_id } => write!(f, "GetChunk({})", chunk_id.short()),
        }
    }
}

impl Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseType::Ack { status, message } => write!(f, "Ack({}, {})", status, message),
            ResponseType::Targets { targets } => write!(f, "Targets({})", targets.len()),
            ResponseType::Files { files } => write!(f, "Files({})", files.len()),
            ResponseType::Manifest { chunks, found } => {
                write!(f, "Manifest({}, found={})", chunks.len(), found)
            }
            ResponseType::Chunk { status, data, .. } => {
                write!(f, "Chunk({}, {} B)", status, data.len())
            }
            ResponseType::Error { message } => write!(f, "Error({})", message),
        }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.request_type, self.request_id)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.response_type, self.request_id)
    }
}

/// Chunk payloads travel as hex strings inside the JSON frames.
mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
