//! Static membership source.
//!
//! Turns successive snapshots of the configured node list into membership
//! events. Used at startup and on every config reload.

use std::collections::{HashMap, HashSet};
use crate::config::NodeConfig;
use crate::discovery::bus::MembershipBus;
use crate::discovery::event::MembershipEvent;
use crate::discovery::node::Node;

type NodeKey = (String, String);

/// Diffs configured node lists against the last published snapshot.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    known: HashMap<NodeKey, Node>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the events that move the published membership to `nodes`.
    ///
    /// Additions and updates come first, in list order; removals follow,
    /// ordered by service then id.
    pub fn diff(&mut self, nodes: &[NodeConfig]) -> Vec<MembershipEvent> {
        let mut events = Vec::new();
        let mut seen: HashSet<NodeKey> = HashSet::with_capacity(nodes.len());

        for cfg in nodes {
            let node = Node::new(&cfg.id, &cfg.address, cfg.weight, &cfg.service);
            let key = (node.service_name.clone(), node.id.clone());
            if !seen.insert(key.clone()) {
                continue;
            }

            match self.known.get(&key) {
                None => events.push(MembershipEvent::AddService(node.clone())),
                Some(prev) if prev != &node => {
                    events.push(MembershipEvent::UpdateService(node.clone()))
                }
                Some(_) => continue,
            }
            self.known.insert(key, node);
        }

        let mut gone: Vec<NodeKey> = self
            .known
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        gone.sort();
        for key in gone {
            if let Some(node) = self.known.remove(&key) {
                events.push(MembershipEvent::RmvService(node));
            }
        }

        events
    }

    /// Diff and publish. Returns the number of events published.
    pub fn sync(&mut self, nodes: &[NodeConfig], bus: &MembershipBus) -> usize {
        let events = self.diff(nodes);
        let count = events.len();
        for event in events {
            bus.publish(event);
        }
        if count > 0 {
            tracing::info!(events = count, nodes = self.known.len(), "Static membership synchronized");
        }
        count
    }

    /// Number of nodes in the last published snapshot.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(id: &str, addr: &str, weight: u32) -> NodeConfig {
        NodeConfig {
            id: id.into(),
            service: "svc".into(),
            address: addr.into(),
            weight,
        }
    }

    #[test]
    fn first_snapshot_adds_everything() {
        let mut discovery = StaticDiscovery::new();
        let events = discovery.diff(&[cfg("a", "h1", 1), cfg("b", "h2", 2)]);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, MembershipEvent::AddService(_))));
        assert_eq!(discovery.len(), 2);
    }

    #[test]
    fn changes_become_updates_and_removals() {
        let mut discovery = StaticDiscovery::new();
        discovery.diff(&[cfg("a", "h1", 1), cfg("b", "h2", 2)]);

        let events = discovery.diff(&[cfg("a", "h1", 5)]);
        assert_eq!(
            events,
            vec![
                MembershipEvent::UpdateService(Node::new("a", "h1", 5, "svc")),
                MembershipEvent::RmvService(Node::new("b", "h2", 2, "svc")),
            ]
        );

        // Unchanged snapshot is silent.
        assert!(discovery.diff(&[cfg("a", "h1", 5)]).is_empty());
    }

    #[tokio::test]
    async fn sync_publishes_on_bus() {
        let bus = MembershipBus::new();
        let mut rx = bus.subscribe();
        let mut discovery = StaticDiscovery::new();

        assert_eq!(discovery.sync(&[cfg("a", "h1", 1)], &bus), 1);
        assert_eq!(
            rx.recv().await,
            Some(MembershipEvent::AddService(Node::new("a", "h1", 1, "svc")))
        );
    }
}
