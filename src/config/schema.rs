//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every section
//! has defaults so a minimal file only lists its nodes.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::pool::PoolConfig;

/// Root configuration for the dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Enabled selection strategies.
    pub balancer: BalancerConfig,

    /// Per-address connection pool parameters.
    pub pool: PoolSettings,

    /// Static membership list.
    pub nodes: Vec<NodeConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Strategy names, in order. Each service gets one instance of each.
    pub strategies: Vec<String>,

    /// Strategy used when a caller does not name one.
    pub default_strategy: String,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategies: vec!["swrr".to_string()],
            default_strategy: "swrr".to_string(),
        }
    }
}

/// Connection pool settings as written in the file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub idle_timeout_secs: u64,

    /// Idle sweep cadence; derived from the idle timeout when absent.
    pub reap_interval_ms: Option<u64>,

    pub connect_timeout_ms: u64,

    /// Bound on waiting for a free connection; unbounded when absent.
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            max_capacity: 16,
            idle_timeout_secs: 120,
            reap_interval_ms: None,
            connect_timeout_ms: 3000,
            acquire_timeout_ms: None,
        }
    }
}

impl PoolSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            initial_capacity: self.initial_capacity,
            max_capacity: self.max_capacity,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            reap_interval: self.reap_interval_ms.map(Duration::from_millis),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

/// One statically configured node.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeConfig {
    /// Node identifier, unique within its service.
    pub id: String,

    /// Service this node serves.
    pub service: String,

    /// Transport address (e.g., "127.0.0.1:7000").
    pub address: String,

    /// Selection weight (default: 1). Zero keeps the node known but unpicked.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
