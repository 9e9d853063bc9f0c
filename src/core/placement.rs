use crate::core::chunk_id::ChunkId;
use crate::networking::node_info::StorageNodeRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

///
/// How the coordinator picks write targets for a chunk.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// The first `K` nodes in registration order, whatever the chunk.
    #[default]
    FirstRegistered,
    /// Highest-random-weight hashing of the chunk id against every node id.
    Rendezvous,
}

impl PlacementPolicy {
    ///
    /// Selects `replication_factor` targets from `nodes` (given in registration order).
    ///
    /// Returns an empty list when fewer than `replication_factor` nodes are available, since
    /// the requested replication cannot be honoured.
    ///
    pub fn select(
        &self,
        chunk_id: &ChunkId,
        nodes: &[StorageNodeRecord],
        replication_factor: usize,
    ) -> Vec<StorageNodeRecord> {
        if replication_factor == 0 || nodes.len() < replication_factor {
            return Vec::new();
        }

        match self {
            PlacementPolicy::FirstRegistered => {
                nodes.iter().take(replication_factor).cloned().collect()
            }
            PlacementPolicy::Rendezvous => {
                let mut scored: Vec<(u64, usize)> = nodes
                    .iter()
                    .enumerate()
                    .map(|(position, node)| (rendezvous_score(chunk_id, &node.node_id), position))
                    .collect();
                // Highest score first; registration order breaks ties.
                scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
                scored
                    .into_iter()
                    .take(replication_factor)
                    .map(|(_, position)| nodes[position].clone())
                    .collect()
            }
        }
    }
}

fn rendezvous_score(chunk_id: &ChunkId, node_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(chunk_id.as_bytes());
    hasher.update(node_id.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

impl fmt::Display for PlacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementPolicy::FirstRegistered => write!(f, "first_registered"),
            PlacementPolicy::Rendezvous => write!(f, "rendezvous"),
        }
    }
}

impl FromStr for PlacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_registered" | "first-registered" => Ok(PlacementPolicy::FirstRegistered),
            "rendezvous" => Ok(PlacementPolicy::Rendezvous),
            other => Err(format!("Unknown placement policy '{}'", other)),
        }
    }
}
