//! Call dispatch: node selection plus pooled connection acquisition.
//!
//! # Data Flow
//! ```text
//! Dispatcher::call(strategy, service, invoke)
//!     → BalancerGroup::pick            → Node
//!     → pool for node.address          → created on first use
//!     → ConnectionPool::get            → Pooled<C>
//!     → invoke(&mut C)
//!         → Ok   → connection released to idle
//!         → Err  → connection marked unhealthy, discarded on release
//! ```
//!
//! # Design Decisions
//! - Pools are keyed by address, so services sharing an endpoint share a pool
//! - No retry on failure; the caller decides
//! - Removing a node evicts its pool

pub mod connector;
pub mod dispatcher;
pub mod error;

pub use connector::Connector;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
