//! Membership subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery source (static_list.rs, or an external registry)
//!     → MembershipEvent { AddService | UpdateService | RmvService }
//!     → bus.rs (one ordered inbox per subscriber)
//!     → BalancerGroup inbox task (strategy state)
//!     → Dispatcher inbox task (pool eviction)
//! ```
//!
//! # Design Decisions
//! - Events carry the full node; consumers never look anything up
//! - Per-subscriber inboxes preserve publication order
//! - No persistence: membership is rebuilt from live events

pub mod bus;
pub mod event;
pub mod node;
pub mod static_list;

pub use bus::MembershipBus;
pub use event::MembershipEvent;
pub use node::Node;
pub use static_list::StaticDiscovery;
