//! Node selection errors.

use thiserror::Error;

/// Errors returned by strategies and the balancer group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    /// The service has no node with a positive weight.
    #[error("no available node for service '{service}'")]
    NoAvailableNode { service: String },

    /// The strategy name is not configured (or not registered).
    #[error("strategy '{strategy}' not found")]
    StrategyNotFound { strategy: String },
}

impl BalancerError {
    pub(crate) fn no_node(service: &str) -> Self {
        BalancerError::NoAvailableNode {
            service: service.to_string(),
        }
    }
}
