//! In-process membership event bus.
//!
//! Every subscriber gets its own unbounded inbox, so a slow consumer never
//! reorders or drops events for the others.

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use crate::discovery::event::MembershipEvent;

/// Fan-out channel for membership events.
#[derive(Debug, Default)]
pub struct MembershipBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<MembershipEvent>>>,
}

impl MembershipBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new inbox. Events published afterwards are delivered to it
    /// in publication order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MembershipEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver an event to every live subscriber. Returns the number of
    /// inboxes that received it.
    pub fn publish(&self, event: MembershipEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Closed inboxes are pruned on the way.
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        tracing::trace!(
            kind = event.kind(),
            node = %event.node(),
            subscribers = subscribers.len(),
            "Membership event published"
        );
        subscribers.len()
    }

    /// Current number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::node::Node;

    #[tokio::test]
    async fn events_arrive_in_order_for_every_subscriber() {
        let bus = MembershipBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let n1 = Node::new("1", "addr1", 1, "svc");
        let n2 = Node::new("2", "addr2", 1, "svc");
        assert_eq!(bus.publish(MembershipEvent::AddService(n1.clone())), 2);
        bus.publish(MembershipEvent::RmvService(n2.clone()));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await, Some(MembershipEvent::AddService(n1.clone())));
            assert_eq!(rx.recv().await, Some(MembershipEvent::RmvService(n2.clone())));
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = MembershipBus::new();
        let rx = bus.subscribe();
        let _keep = bus.subscribe();
        drop(rx);

        let delivered = bus.publish(MembershipEvent::AddService(Node::new("1", "a", 1, "svc")));
        assert_eq!(delivered, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
