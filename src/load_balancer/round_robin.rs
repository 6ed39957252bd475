//! Round-robin load balancing strategy.

use crate::discovery::Node;
use crate::load_balancer::{node_set::NodeSet, BalancerError, Strategy};

pub const NAME: &str = "round_robin";

/// Round-robin selector.
/// Stores an internal counter to rotate through nodes, ignoring weights
/// except that weight-0 nodes are skipped.
#[derive(Debug)]
pub struct RoundRobin {
    nodes: NodeSet<()>,
    counter: usize,
}

impl RoundRobin {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            nodes: NodeSet::new(service),
            counter: 0,
        }
    }
}

impl Strategy for RoundRobin {
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
        let entries = self.nodes.entries();
        let len = entries.len();
        let start = self.counter;
        self.counter = self.counter.wrapping_add(1);

        // Bounded scan so an all-zero set cannot loop forever
        for i in 0..len {
            let (node, _) = &entries[start.wrapping_add(i) % len];
            if node.weight > 0 {
                return Ok(node.clone());
            }
        }
        Err(BalancerError::no_node(self.nodes.service()))
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.nodes()
    }
}
