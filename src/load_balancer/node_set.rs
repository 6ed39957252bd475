//! Ordered node storage shared by the strategies.

use crate::discovery::Node;

/// Nodes of one service kept sorted by id, each with strategy-owned state.
///
/// Sorting by id makes iteration deterministic, which is what breaks ties.
#[derive(Debug)]
pub struct NodeSet<S> {
    service: String,
    entries: Vec<(Node, S)>,
    total_weight: u64,
}

impl<S: Default> NodeSet<S> {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Vec::new(),
            total_weight: 0,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Insert a node, or replace address/weight if the id is present.
    /// Replacing keeps the node's selection state.
    pub fn upsert(&mut self, node: Node) {
        match self.position(&node.id) {
            Ok(idx) => self.entries[idx].0 = node,
            Err(idx) => self.entries.insert(idx, (node, S::default())),
        }
        self.recompute();
    }

    /// Remove by id. Returns false if the id was absent.
    pub fn remove(&mut self, node_id: &str) -> bool {
        match self.position(node_id) {
            Ok(idx) => {
                self.entries.remove(idx);
                self.recompute();
                true
            }
            Err(_) => false,
        }
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Node, S)] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [(Node, S)] {
        &mut self.entries
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.entries.iter().map(|(node, _)| node.clone()).collect()
    }

    fn position(&self, node_id: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(node, _)| node.id.as_str().cmp(node_id))
    }

    fn recompute(&mut self) {
        self.total_weight = self
            .entries
            .iter()
            .map(|(node, _)| u64::from(node.weight))
            .sum();
    }
}
