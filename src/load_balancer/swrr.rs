//! Smooth weighted round-robin strategy.
//!
//! Every pick adds each node's weight to its running `current` value, selects
//! the node with the largest `current` and subtracts the total weight from it.
//! Over a full cycle each node is picked `weight / total` of the time, and
//! heavy nodes are interleaved with light ones instead of picked in bursts.

use crate::discovery::Node;
use crate::load_balancer::{node_set::NodeSet, BalancerError, Strategy};

pub const NAME: &str = "swrr";

/// Smooth weighted round-robin selector.
#[derive(Debug)]
pub struct SmoothWeightedRoundRobin {
    /// Per-node `current` accumulator.
    nodes: NodeSet<i64>,
}

impl SmoothWeightedRoundRobin {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            nodes: NodeSet::new(service),
        }
    }
}

impl Strategy for SmoothWeightedRoundRobin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn add(&mut self, node: Node) {
        self.nodes.upsert(node);
    }

    fn update(&mut self, node: Node) {
        self.nodes.upsert(node);
    }

    fn rmv(&mut self, node_id: &str) {
        self.nodes.remove(node_id);
    }

    fn pick(&mut self) -> Result<Node, BalancerError> {
        let total = self.nodes.total_weight();
        if total == 0 {
            return Err(BalancerError::no_node(self.nodes.service()));
        }

        let mut best: Option<usize> = None;
        let mut best_current = i64::MIN;
        for (idx, (node, current)) in self.nodes.entries_mut().iter_mut().enumerate() {
            if node.weight == 0 {
                continue;
            }
            *current += i64::from(node.weight);
            // Strict comparison: on ties the lowest id (first in order) wins.
            if *current > best_current {
                best_current = *current;
                best = Some(idx);
            }
        }

        let idx = best.ok_or_else(|| BalancerError::no_node(self.nodes.service()))?;
        let (node, current) = &mut self.nodes.entries_mut()[idx];
        *current -= total as i64;
        Ok(node.clone())
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.nodes()
    }
}
