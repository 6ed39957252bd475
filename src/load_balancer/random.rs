//! Weighted random strategy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::discovery::Node;
use crate::load_balancer::{node_set::NodeSet, BalancerError, Strategy};

pub const NAME: &str = "random";

/// Picks a node at random with probability `weight / total`.
#[derive(Debug)]
pub struct WeightedRandom {
    nodes: NodeSet<()>,
    rng: StdRng,
}

impl WeightedRandom {
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_rng(service, StdRng::from_entropy())
    }

    /// Deterministic variant for tests and simulations.
    pub fn with_seed(service: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(service, StdRng::seed_from_u64(seed))
    }

    fn with_rng(service: impl Into<String>, rng: StdRng) -> Self {
        Self {
            nodes: NodeSet::new(service),
            rng,
        }
    }
}

impl Strategy for WeightedRandom {
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

        let mut ticket = self.rng.gen_range(0..total);
        for (node, _) in self.nodes.entries() {
            let weight = u64::from(node.weight);
            if ticket < weight {
                return Ok(node.clone());
            }
            ticket -= weight;
        }
        Err(BalancerError::no_node(self.nodes.service()))
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.nodes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_distribution() {
        let mut lb = WeightedRandom::with_seed("svc", 7);
        lb.add(Node::new("heavy", "h1", 9, "svc"));
        lb.add(Node::new("light", "h2", 1, "svc"));

        let heavy = (0..10_000)
            .filter(|_| lb.pick().unwrap().id == "heavy")
            .count();
        // Expect ~9000; allow wide slack.
        assert!((8_500..9_500).contains(&heavy), "heavy picked {heavy} times");
    }

    #[test]
    fn test_only_live_nodes() {
        let mut lb = WeightedRandom::with_seed("svc", 1);
        lb.add(Node::new("A", "a", 3, "svc"));
        lb.add(Node::new("B", "b", 2, "svc"));
        lb.update(Node::new("A", "a", 3, "svc"));
        lb.rmv("B");

        for _ in 0..50 {
            assert_eq!(lb.pick().unwrap().id, "A");
        }
    }

    #[test]
    fn test_zero_weight_never_picked() {
        let mut lb = WeightedRandom::with_seed("svc", 3);
        lb.add(Node::new("zero", "z", 0, "svc"));
        assert!(matches!(lb.pick(), Err(BalancerError::NoAvailableNode { .. })));

        lb.add(Node::new("one", "o", 1, "svc"));
        for _ in 0..50 {
            assert_eq!(lb.pick().unwrap().id, "one");
        }
    }
}
