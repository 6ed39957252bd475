//! Membership event definitions.

use crate::discovery::node::Node;

/// A change in service membership, as published by a discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A node joined its service.
    AddService(Node),
    /// A node changed address or weight.
    UpdateService(Node),
    /// A node left its service.
    RmvService(Node),
}

impl MembershipEvent {
    /// The node carried by this event.
    pub fn node(&self) -> &Node {
        match self {
            MembershipEvent::AddService(node)
            | MembershipEvent::UpdateService(node)
            | MembershipEvent::RmvService(node) => node,
        }
    }

    /// Short event kind label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MembershipEvent::AddService(_) => "add_service",
            MembershipEvent::UpdateService(_) => "update_service",
            MembershipEvent::RmvService(_) => "rmv_service",
        }
    }
}
