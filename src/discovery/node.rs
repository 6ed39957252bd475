//! Service node definition.

use serde::{Deserialize, Serialize};

/// A weighted, addressed instance of a named service.
///
/// Identity is `id` within `service_name`; two nodes of different services
/// may share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the service.
    pub id: String,
    /// Transport address (e.g., "127.0.0.1:9000").
    pub address: String,
    /// Relative selection weight. Zero means "never selected".
    pub weight: u32,
    /// Service this node belongs to.
    pub service_name: String,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        weight: u32,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            weight,
            service_name: service_name.into(),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.service_name, self.id, self.address)
    }
}
