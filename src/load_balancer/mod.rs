//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Membership event
//!     → group.rs (fan out to every configured strategy of the service)
//!     → Strategy::add / update / rmv
//!
//! Call for (strategy, service)
//!     → group.rs (route to the strategy instance)
//!     → Apply selection algorithm:
//!         - swrr.rs (smooth weighted round robin)
//!         - random.rs (weighted random)
//!         - round_robin.rs (rotate through nodes)
//!     → Node or error
//! ```
//!
//! # Design Decisions
//! - Strategies own their node set; one instance per (service, strategy)
//! - All strategies of a service see the same event stream
//! - Strategies are built by name through an explicit registry
//! - Weight-0 nodes are never selected

pub mod error;
pub mod group;
pub mod node_set;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod swrr;

pub use error::BalancerError;
pub use group::BalancerGroup;
pub use registry::StrategyRegistry;

use crate::discovery::Node;

/// A node selection policy for a single service.
///
/// Implementations are not internally synchronized; the group serializes
/// access to each instance.
pub trait Strategy: Send + std::fmt::Debug {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Insert a node. An existing id is treated as an update.
    fn add(&mut self, node: Node);

    /// Replace address and weight of a node. An absent id is treated as an add.
    fn update(&mut self, node: Node);

    /// Remove a node by id. No-op if absent.
    fn rmv(&mut self, node_id: &str);

    /// Select the next node.
    fn pick(&mut self) -> Result<Node, BalancerError>;

    /// Snapshot of the current node set, ordered by id.
    fn nodes(&self) -> Vec<Node>;
}
