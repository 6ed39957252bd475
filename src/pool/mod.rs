//! Connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionPool::get()
//!     → idle connection available?     → hand it out (stale ones are closed)
//!     → open_count < max_capacity?     → reserve slot, call factory
//!     → otherwise                      → wait for release / close / deadline
//!
//! Pooled<C> released (put or drop)
//!     → healthy and pool open          → back to idle
//!     → unhealthy or pool closed       → close, free the slot
//!
//! reaper.rs (background, per pool)
//!     → close idle connections past idle_timeout, down to initial_capacity
//! ```
//!
//! # Design Decisions
//! - One lock guards idle set, open count and closed flag; the reaper shares it
//! - Ownership makes double release impossible: `put` consumes the guard
//! - Unhealthy connections are replaced lazily on the next `get`
//! - Close is idempotent and wakes every waiter

pub mod config;
pub mod connection;
pub mod connection_pool;
pub mod error;
pub mod pooled;
mod reaper;

pub use config::PoolConfig;
pub use connection::{BoxError, Connection, ConnectionFactory, ConnectionId};
pub use connection_pool::{ConnectionPool, PoolStats};
pub use error::{PoolError, PoolResult};
pub use pooled::Pooled;
