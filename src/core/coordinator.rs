use crate::constants::K;
use crate::core::chunk_id::ChunkId;
use crate::core::placement::PlacementPolicy;
use crate::networking::messages::{RequestType, ResponseType};
use crate::networking::node_info::StorageNodeRecord;
use crate::networking::tcp_listener::RequestHandler;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

///
/// # Directory service.
///
/// Owns the three process-wide mappings of the store: registered storage nodes, chunk replica
/// locations and file manifests. Nothing is persisted; a restarted coordinator starts empty.
///
/// Each mapping sits behind its own lock. When two are needed, `nodes` is always taken before
/// `chunk_locations`, and `manifests` is never held together with another lock.
///
pub struct Coordinator {
    /// Registered nodes in registration order.
    nodes: RwLock<Vec<StorageNodeRecord>>,
    /// Chunk id -> node ids believed to hold a replica, in registration order at seed time.
    chunk_locations: RwLock<HashMap<ChunkId, Vec<String>>>,
    /// Filename -> ordered chunk ids.
    manifests: RwLock<HashMap<String, Vec<ChunkId>>>,
    replication_factor: usize,
    placement: PlacementPolicy,
}

impl Default for Coordinator {
    fn default() -> Self {
        Coordinator::new(K, PlacementPolicy::default())
    }
}

impl Coordinator {
    pub fn new(replication_factor: usize, placement: PlacementPolicy) -> Self {
        Coordinator {
            nodes: RwLock::new(Vec::new()),
            chunk_locations: RwLock::new(HashMap::new()),
            manifests: RwLock::new(HashMap::new()),
            replication_factor,
            placement,
        }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    ///
    /// Registers a storage node.
    ///
    /// Registration is idempotent per `node_id`: a node registering again (e.g. after a restart
    /// on another port) replaces its record in place and keeps its registration position.
    ///
    pub fn register_node(&self, record: StorageNodeRecord) {
        let start_time = Instant::now();
        let mut nodes = write_lock(&self.nodes);
        match nodes.iter_mut().find(|node| node.node_id == record.node_id) {
            Some(existing) => {
                info!("Re-registered node {} (was {})", record, existing);
                *existing = record;
            }
            None => {
                info!(
                    "Registered node {} ({:.2}ms)",
                    record,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                nodes.push(record);
            }
        }
    }

    /// Snapshot of the registered nodes in registration order.
    pub fn registered_nodes(&self) -> Vec<StorageNodeRecord> {
        read_lock(&self.nodes).clone()
    }

    ///
    /// Picks the nodes a chunk should be written to. Empty when fewer than the replication
    /// factor are registered.
    ///
    pub fn put_targets(&self, chunk_id: &ChunkId) -> Vec<StorageNodeRecord> {
        let nodes = read_lock(&self.nodes);
        let targets = self
            .placement
            .select(chunk_id, &nodes, self.replication_factor);
        if targets.is_empty() {
            warn!(
                "No put targets for chunk {}: {} of {} required nodes registered",
                chunk_id.short(),
                nodes.len(),
                self.replication_factor
            );
        }
        targets
    }

    ///
    /// Stores (or overwrites) the manifest of `filename` and seeds a location set for every
    /// chunk that has none yet, using every node registered right now.
    ///
    pub fn announce_manifest(&self, filename: String, chunks: Vec<ChunkId>) {
        let start_time = Instant::now();
        let chunk_count = chunks.len();

        {
            let nodes = read_lock(&self.nodes);
            let snapshot: Vec<String> = nodes.iter().map(|node| node.node_id.clone()).collect();
            let mut chunk_locations = write_lock(&self.chunk_locations);
            for chunk_id in &chunks {
                chunk_locations
                    .entry(*chunk_id)
                    .or_insert_with(|| snapshot.clone());
            }
        }

        write_lock(&self.manifests).insert(filename.clone(), chunks);

        info!(
            "Manifest announced for file: {} ({} chunks, {:.2}ms)",
            filename,
            chunk_count,
            start_time.elapsed().as_secs_f64() * 1000.0
        );
    }

    /// The chunk sequence of `filename`, or `None` if it was never announced.
    pub fn manifest(&self, filename: &str) -> Option<Vec<ChunkId>> {
        read_lock(&self.manifests).get(filename).cloned()
    }

    ///
    /// Nodes believed to hold `chunk_id`, in the order captured when the location set was
    /// seeded, resolved to their current registration records.
    ///
    pub fn get_targets(&self, chunk_id: &ChunkId) -> Vec<StorageNodeRecord> {
        let nodes = read_lock(&self.nodes);
        let chunk_locations = read_lock(&self.chunk_locations);
        match chunk_locations.get(chunk_id) {
            Some(node_ids) => node_ids
                .iter()
                .filter_map(|node_id| nodes.iter().find(|node| &node.node_id == node_id))
                .cloned()
                .collect(),
            None => {
                debug!("No known locations for chunk {}", chunk_id.short());
                Vec::new()
            }
        }
    }

    /// Every announced filename, in no particular order.
    pub fn list_files(&self) -> Vec<String> {
        read_lock(&self.manifests).keys().cloned().collect()
    }
}

impl RequestHandler for Coordinator {
    fn handle(&self, request: RequestType) -> ResponseType {
        match request {
            RequestType::RegisterNode {
                host,
                port,
                node_id,
            } => {
                self.register_node(StorageNodeRecord::new(host, port, node_id));
                ResponseType::ack_ok("Node registered")
            }
            RequestType::RequestPutTargets { chunk_id } => ResponseType::Targets {
                targets: self.put_targets(&chunk_id),
            },
            RequestType::AnnounceManifest { filename, chunks } => {
                self.announce_manifest(filename, chunks);
                ResponseType::ack_ok("Manifest stored")
            }
            RequestType::ListFiles => ResponseType::Files {
                files: self.list_files(),
            },
            RequestType::GetManifest { filename } => match self.manifest(&filename) {
                Some(chunks) => ResponseType::Manifest {
                    chunks,
                    found: true,
                },
                None => ResponseType::Manifest {
                    chunks: Vec::new(),
                    found: false,
                },
            },
            RequestType::RequestGetTargets { chunk_id } => ResponseType::Targets {
                targets: self.get_targets(&chunk_id),
            },
            other => {
                warn!("Coordinator received a storage request: {}", other);
                ResponseType::Error {
                    message: format!("Coordinator does not serve {}", other),
                }
            }
        }
    }
}

// Every update is a single insert or replace, so poisoned data is still consistent.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn node(index: u16) -> StorageNodeRecord {
        StorageNodeRecord::new("127.0.0.1", 9100 + index, format!("node-{}", index))
    }

    fn chunk(index: u64) -> ChunkId {
        ChunkId::from_chunk(b"coordinator test", index)
    }

    #[test]
    fn test_put_targets_with_no_nodes_is_empty() {
        let coordinator = Coordinator::default();
        assert!(coordinator.put_targets(&chunk(0)).is_empty());
    }

    #[test]
    fn test_put_targets_with_fewer_than_k_nodes_is_empty() {
        let coordinator = Coordinator::default();
        coordinator.register_node(node(0));
        assert!(coordinator.put_targets(&chunk(0)).is_empty());
    }

    #[test]
    fn test_put_targets_returns_first_k_in_registration_order() {
        let coordinator = Coordinator::default();
        for i in 0..4 {
            coordinator.register_node(node(i));
        }
        let targets = coordinator.put_targets(&chunk(0));
        assert_eq!(targets.len(), K);
        assert_eq!(targets, vec![node(0), node(1)]);
        assert_eq!(coordinator.put_targets(&chunk(7)), targets);
    }

    #[test]
    fn test_register_node_is_idempotent_per_node_id() {
        let coordinator = Coordinator::default();
        coordinator.register_node(node(0));
        coordinator.register_node(node(1));
        coordinator.register_node(StorageNodeRecord::new("127.0.0.1", 9999, "node-0"));

        let nodes = coordinator.registered_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].port, 9999);
        assert_eq!(nodes[1], node(1));
    }

    #[test]
    fn test_announce_then_get_manifest_returns_same_sequence() {
        let coordinator = Coordinator::default();
        let sequence = vec![chunk(0), chunk(1), chunk(2)];
        coordinator.announce_manifest("a.bin".to_string(), sequence.clone());
        assert_eq!(coordinator.manifest("a.bin"), Some(sequence));
    }

    #[test]
    fn test_announce_overwrites_previous_manifest() {
        let coordinator = Coordinator::default();
        coordinator.announce_manifest("a.bin".to_string(), vec![chunk(0), chunk(1)]);
        coordinator.announce_manifest("a.bin".to_string(), vec![chunk(5)]);
        assert_eq!(coordinator.manifest("a.bin"), Some(vec![chunk(5)]));
        assert_eq!(coordinator.list_files(), vec!["a.bin".to_string()]);
    }

    #[test]
    fn test_unknown_and_empty_manifests_are_distinct() {
        let coordinator = Coordinator::default();
        coordinator.announce_manifest("empty.txt".to_string(), Vec::new());
        assert_eq!(coordinator.manifest("empty.txt"), Some(Vec::new()));
        assert_eq!(coordinator.manifest("missing.txt"), None);
    }

    #[test]
    fn test_location_set_is_snapshot_of_all_registered_nodes() {
        let coordinator = Coordinator::default();
        for i in 0..3 {
            coordinator.register_node(node(i));
        }
        coordinator.announce_manifest("a.bin".to_string(), vec![chunk(0)]);
        coordinator.register_node(node(3));

        assert_eq!(
            coordinator.get_targets(&chunk(0)),
            vec![node(0), node(1), node(2)]
        );
    }

    #[test]
    fn test_location_set_is_seeded_only_once() {
        let coordinator = Coordinator::default();
        coordinator.register_node(node(0));
        coordinator.announce_manifest("a.bin".to_string(), vec![chunk(0)]);
        coordinator.register_node(node(1));
        coordinator.announce_manifest("b.bin".to_string(), vec![chunk(0), chunk(1)]);

        assert_eq!(coordinator.get_targets(&chunk(0)), vec![node(0)]);
        assert_eq!(coordinator.get_targets(&chunk(1)), vec![node(0), node(1)]);
    }

    #[test]
    fn test_get_targets_follows_re_registration() {
        let coordinator = Coordinator::default();
        coordinator.register_node(node(0));
        coordinator.announce_manifest("a.bin".to_string(), vec![chunk(0)]);
        coordinator.register_node(StorageNodeRecord::new("10.0.0.9", 7000, "node-0"));

        let targets = coordinator.get_targets(&chunk(0));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].address(), "10.0.0.9:7000");
    }

    #[test]
    fn test_get_targets_for_unknown_chunk_is_empty() {
        let coordinator = Coordinator::default();
        coordinator.register_node(node(0));
        assert!(coordinator.get_targets(&chunk(42)).is_empty());
    }

    #[test]
    fn test_concurrent_registrations_are_not_lost() {
        let coordinator = Arc::new(Coordinator::default());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let coordinator = coordinator.clone();
                thread::spawn(move || coordinator.register_node(node(i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(coordinator.registered_nodes().len(), 16);
    }

    #[test]
    fn test_concurrent_announcements_are_not_lost() {
        let coordinator = Arc::new(Coordinator::default());
        coordinator.register_node(node(0));
        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let coordinator = coordinator.clone();
                thread::spawn(move || {
                    coordinator.announce_manifest(format!("file-{}", i), vec![chunk(i)])
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(coordinator.list_files().len(), 16);
        for i in 0..16u64 {
            assert_eq!(coordinator.get_targets(&chunk(i)), vec![node(0)]);
        }
    }

    #[test]
    fn test_handle_get_manifest_reports_found_flag() {
        let coordinator = Coordinator::default();
        let response = coordinator.handle(RequestType::GetManifest {
            filename: "nope".to_string(),
        });
        assert_eq!(
            response,
            ResponseType::Manifest {
                chunks: Vec::new(),
                found: false
            }
        );
    }

    #[test]
    fn test_handle_rejects_storage_requests() {
        let coordinator = Coordinator::default();
        let response = coordinator.handle(RequestType::GetChunk { chunk_id: chunk(0) });
        assert!(matches!(response, ResponseType::Error { .. }));
    }

    #[test]
    fn test_rendezvous_coordinator_spreads_chunks() {
        let coordinator = Coordinator::new(2, PlacementPolicy::Rendezvous);
        for i in 0..8 {
            coordinator.register_node(node(i));
        }
        let placements: std::collections::HashSet<Vec<String>> = (0..32u64)
            .map(|i| {
                coordinator
                    .put_targets(&chunk(i))
                    .into_iter()
                    .map(|node| node.node_id)
                    .collect()
            })
            .collect();
        assert!(placements.len() > 1);
    }
}
