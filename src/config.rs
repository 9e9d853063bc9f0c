use crate::constants::{
    CHUNK_SIZE_B, DEFAULT_COORDINATOR_ADDRESS, DEFAULT_MIN_REPLICAS, DEFAULT_STORAGE_ADDRESS,
    DEFAULT_STORAGE_PATH, K, MAX_FILE_SIZE_MB, RECEIVE_WORKER_TASK_COUNT,
    REQUEST_TIMEOUT_MILLISECONDS,
};
use crate::core::placement::PlacementPolicy;
use crate::sharding::uploader::FileSplitter;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Value of `advertise_host` that asks for the first non-loopback IPv4 interface.
pub const AUTO_HOST: &str = "auto";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("No non-loopback IPv4 interface found")]
    NoInterface,
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

///
/// Configuration of every role, loaded from a YAML file. Missing sections and keys fall back
/// to defaults, so an empty file is a valid configuration.
///
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub storage: StorageConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub listen_address: String,
    pub replication_factor: usize,
    pub placement: PlacementPolicy,
    pub worker_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Random UUID when unset.
    pub node_id: Option<String>,
    pub listen_address: String,
    /// Host registered with the coordinator. Defaults to the host part of `listen_address`.
    pub advertise_host: Option<String>,
    pub storage_path: String,
    pub coordinator_address: String,
    pub worker_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub coordinator_address: String,
    pub chunk_size: usize,
    pub min_replicas: usize,
    pub verify_chunks: bool,
    pub parallel_replica_push: bool,
    pub request_timeout_ms: u64,
    pub max_file_size_mb: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            listen_address: DEFAULT_COORDINATOR_ADDRESS.to_string(),
            replication_factor: K,
            placement: PlacementPolicy::default(),
            worker_count: RECEIVE_WORKER_TASK_COUNT,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            node_id: None,
            listen_address: DEFAULT_STORAGE_ADDRESS.to_string(),
            advertise_host: None,
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            coordinator_address: DEFAULT_COORDINATOR_ADDRESS.to_string(),
            worker_count: RECEIVE_WORKER_TASK_COUNT,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            coordinator_address: DEFAULT_COORDINATOR_ADDRESS.to_string(),
            chunk_size: CHUNK_SIZE_B,
            min_replicas: DEFAULT_MIN_REPLICAS,
            verify_chunks: true,
            parallel_replica_push: false,
            request_timeout_ms: REQUEST_TIMEOUT_MILLISECONDS,
            max_file_size_mb: MAX_FILE_SIZE_MB,
        }
    }
}

impl Config {
    pub fn parse_from_file(file_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file_path)?;
        Config::parse_from_str(&content)
    }

    pub fn parse_from_str(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml reads an empty document as null rather than an empty mapping.
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.replication_factor == 0 {
            return Err(ConfigError::InvalidValue(
                "coordinator.replication_factor must be at least 1".to_string(),
            ));
        }
        FileSplitter::new(self.client.chunk_size, self.client.max_file_size_mb)
            .map_err(|e| ConfigError::InvalidValue(format!("client.chunk_size: {}", e)))?;
        Ok(())
    }
}

impl StorageConfig {
    pub fn resolve_node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    ///
    /// Host this node registers under. `bound` is the address the listener actually got.
    ///
    pub fn resolve_advertise_host(&self, bound: SocketAddr) -> Result<String, ConfigError> {
        match self.advertise_host.as_deref() {
            Some(AUTO_HOST) => first_external_ipv4().map(|ip| ip.to_string()),
            Some(host) => Ok(host.to_string()),
            None if bound.ip().is_unspecified() => first_external_ipv4().map(|ip| ip.to_string()),
            None => Ok(bound.ip().to_string()),
        }
    }
}

fn first_external_ipv4() -> Result<IpAddr, ConfigError> {
    get_if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|interface| !interface.is_loopback())
        .map(|interface| interface.ip())
        .find(|ip| ip.is_ipv4())
        .ok_or(ConfigError::NoInterface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_config_parsing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = File::create(&file_path).unwrap();

        writeln!(
            file,
            r#"
coordinator:
  listen_address: "0.0.0.0:7000"
  replication_factor: 3
  placement: rendezvous
storage:
  node_id: "node-a"
  listen_address: "127.0.0.1:7001"
  storage_path: "data/node-a"
  coordinator_address: "10.0.0.1:7000"
client:
  coordinator_address: "10.0.0.1:7000"
  chunk_size: 1024
  max_file_size_mb: 16
  min_replicas: 2
  verify_chunks: false
"#
        )
        .unwrap();

        let config = Config::parse_from_file(&file_path).expect("Failed to parse config file");

        assert_eq!(config.coordinator.listen_address, "0.0.0.0:7000");
        assert_eq!(config.coordinator.replication_factor, 3);
        assert_eq!(config.coordinator.placement, PlacementPolicy::Rendezvous);
        assert_eq!(config.coordinator.worker_count, RECEIVE_WORKER_TASK_COUNT);
        assert_eq!(config.storage.node_id, Some("node-a".to_string()));
        assert_eq!(config.storage.storage_path, "data/node-a");
        assert_eq!(config.client.chunk_size, 1024);
        assert_eq!(config.client.max_file_size_mb, 16);
        assert_eq!(config.client.min_replicas, 2);
        assert!(!config.client.verify_chunks);
        assert_eq!(config.client.request_timeout_ms, REQUEST_TIMEOUT_MILLISECONDS);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.coordinator.replication_factor, K);
        assert_eq!(config.client.chunk_size, CHUNK_SIZE_B);
        assert!(config.client.verify_chunks);
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config = Config::parse_from_str("client:\n  min_replicas: 0\n").unwrap();
        assert_eq!(config.client.min_replicas, 0);
        assert_eq!(config.client.coordinator_address, DEFAULT_COORDINATOR_ADDRESS);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Config::parse_from_str("coordinator:\n  replication_factor: 0\n"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::parse_from_str("client:\n  chunk_size: 0\n"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::parse_from_str("client:\n  chunk_size: 9437184\n"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::parse_from_str("client:\n  chunk_size: 16384\n"),
            Err(ConfigError::InvalidValue(_))
        ));
        let smaller_files = "client:\n  chunk_size: 16384\n  max_file_size_mb: 1024\n";
        assert!(Config::parse_from_str(smaller_files).is_ok());
        assert!(matches!(
            Config::parse_from_str("coordinator:\n  placement: random\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = Config::parse_from_file(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_node_id_defaults_to_random_uuid() {
        let storage = StorageConfig::default();
        let first = storage.resolve_node_id();
        let second = storage.resolve_node_id();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());

        let named = StorageConfig {
            node_id: Some("fixed".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(named.resolve_node_id(), "fixed");
    }

    #[test]
    fn test_advertise_host_resolution() {
        let bound: SocketAddr = "127.0.0.1:4321".parse().unwrap();
        let storage = StorageConfig::default();
        assert_eq!(storage.resolve_advertise_host(bound).unwrap(), "127.0.0.1");

        let explicit = StorageConfig {
            advertise_host: Some("storage-1.internal".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(
            explicit.resolve_advertise_host(bound).unwrap(),
            "storage-1.internal"
        );
    }
}
