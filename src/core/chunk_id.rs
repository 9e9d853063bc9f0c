use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Digest length in bytes (SHA-256).
pub const CHUNK_ID_LENGTH: usize = 32;

type ChunkIdValue = [u8; CHUNK_ID_LENGTH];

#[derive(Error, Debug, PartialEq)]
pub enum ChunkIdError {
    #[error("Chunk id must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Chunk id is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

///
/// Content and position derived chunk identifier.
///
/// Rendered as a lowercase hex string, which is also the name of the chunk object on a
/// storage node and the form it takes on the wire.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
pub struct ChunkId {
    pub(crate) value: ChunkIdValue,
}

impl ChunkId {
    ///
    /// Derives the id of a chunk: `sha256(bytes || decimal(sequence_index))`.
    ///
    /// The index is part of the digest input, so equal bytes at different positions never
    /// share an id.
    ///
    pub fn from_chunk(bytes: &[u8], sequence_index: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(sequence_index.to_string().as_bytes());
        ChunkId {
            value: hasher.finalize().into(),
        }
    }

    /// Checks that `bytes` found at `sequence_index` really are the chunk named by this id.
    pub fn matches(&self, bytes: &[u8], sequence_index: u64) -> bool {
        ChunkId::from_chunk(bytes, sequence_index) == *self
    }

    pub fn from_hex_str(input: &str) -> Result<Self, ChunkIdError> {
        if input.len() != CHUNK_ID_LENGTH * 2 {
            return Err(ChunkIdError::InvalidLength {
                expected: CHUNK_ID_LENGTH * 2,
                actual: input.len(),
            });
        }
        let mut value: ChunkIdValue = [0u8; CHUNK_ID_LENGTH];
        hex::decode_to_slice(input, &mut value)?;
        Ok(ChunkId { value })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Short form used in log lines.
    pub fn short(&self) -> String {
        let mut full = self.to_string();
        full.truncate(crate::constants::LOG_ID_PREFIX_LEN);
        full
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.value {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for ChunkId {
    type Err = ChunkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkId::from_hex_str(s)
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChunkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ChunkId::from_hex_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_deterministic() {
        let data = b"some chunk payload";
        assert_eq!(ChunkId::from_chunk(data, 3), ChunkId::from_chunk(data, 3));
    }

    #[test]
    fn test_chunk_id_depends_on_position() {
        let data = vec![7u8; 1024];
        assert_ne!(ChunkId::from_chunk(&data, 0), ChunkId::from_chunk(&data, 1));
    }

    #[test]
    fn test_chunk_id_depends_on_content() {
        assert_ne!(ChunkId::from_chunk(b"a", 0), ChunkId::from_chunk(b"b", 0));
    }

    #[test]
    fn test_chunk_id_known_digest() {
        // sha256("abc" || "0")
        let id = ChunkId::from_chunk(b"abc", 0);
        let mut hasher = Sha256::new();
        hasher.update(b"abc0");
        assert_eq!(id.to_string(), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_chunk_id_hex_round_trip() {
        let id = ChunkId::from_chunk(b"payload", 42);
        let text = id.to_string();
        assert_eq!(text.len(), CHUNK_ID_LENGTH * 2);
        assert_eq!(text, text.to_lowercase());
        assert_eq!(ChunkId::from_hex_str(&text).unwrap(), id);
    }

    #[test]
    fn test_chunk_id_rejects_bad_input() {
        assert!(matches!(
            ChunkId::from_hex_str("abcd"),
            Err(ChunkIdError::InvalidLength { .. })
        ));
        let not_hex = "zz".repeat(CHUNK_ID_LENGTH);
        assert!(matches!(
            ChunkId::from_hex_str(&not_hex),
            Err(ChunkIdError::InvalidHex(_))
        ));
        assert!(ChunkId::from_hex_str("../../etc/passwd").is_err());
    }

    #[test]
    fn test_chunk_id_matches() {
        let id = ChunkId::from_chunk(b"verify me", 5);
        assert!(id.matches(b"verify me", 5));
        assert!(!id.matches(b"verify me", 6));
        assert!(!id.matches(b"tampered!", 5));
    }

    #[test]
    fn test_chunk_id_serde_as_string() {
        let id = ChunkId::from_chunk(b"serde", 0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: ChunkId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
