// This module contains all the constants that affect the behavior of the store.

/// # Replication factor.
/// Number of storage nodes every chunk is pushed to on upload. The coordinator hands out no
/// targets at all while fewer nodes than this are registered.
pub const K: usize = 2;

/// The size of a single file data chunk in bytes. Only the final chunk of a file may be shorter.
pub const CHUNK_SIZE_B: usize = 64 * 1024; // 64 KB

/// Maximum size of file accepted for upload in MB.
pub const MAX_FILE_SIZE_MB: usize = 4096; // 4 GB

/// Minimum number of successful replica pushes per chunk before an upload may continue.
pub const DEFAULT_MIN_REPLICAS: usize = 1;

/// Largest frame accepted on the wire. A hex-encoded chunk plus envelope fits comfortably.
pub const MAX_FRAME_SIZE_B: usize = 16 * 1024 * 1024; // 16 MB

/// Part of every frame kept free for the envelope, request id and filename.
pub const FRAME_ENVELOPE_RESERVE_B: usize = 64 * 1024;

/// Largest chunk whose hex-encoded `PutChunk` still fits in one frame.
pub const MAX_CHUNK_SIZE_B: usize = (MAX_FRAME_SIZE_B - FRAME_ENVELOPE_RESERVE_B) / 2;

/// Encoded size of one manifest entry: 64 hex characters, two quotes and a comma.
pub const MANIFEST_ENTRY_SIZE_B: usize = 67;

/// Most chunk ids a single `AnnounceManifest` frame can carry.
pub const MAX_MANIFEST_CHUNKS: usize =
    (MAX_FRAME_SIZE_B - FRAME_ENVELOPE_RESERVE_B) / MANIFEST_ENTRY_SIZE_B;

pub const DEFAULT_COORDINATOR_ADDRESS: &str = "127.0.0.1:9000";
pub const DEFAULT_STORAGE_ADDRESS: &str = "127.0.0.1:9001";
pub const DEFAULT_STORAGE_PATH: &str = "storage";

/// Timeout for a single client-side call (connect + request + response).
pub const REQUEST_TIMEOUT_MILLISECONDS: u64 = 5000;

/// Number of connections served concurrently by a coordinator or storage node.
pub const RECEIVE_WORKER_TASK_COUNT: usize = 10;

/// Number of hex characters of a chunk id shown in log lines.
pub const LOG_ID_PREFIX_LEN: usize = 16;
