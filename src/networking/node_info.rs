use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

///
/// A reachable storage endpoint as registered with the coordinator.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageNodeRecord {
    pub host: String,
    pub port: u16,
    pub node_id: String,
}

impl StorageNodeRecord {
    pub fn new(host: impl Into<String>, port: u16, node_id: impl Into<String>) -> Self {
        StorageNodeRecord {
            host: host.into(),
            port,
            node_id: node_id.into(),
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Display for StorageNodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.node_id, self.host, self.port)
    }
}
