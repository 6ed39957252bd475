//! Client-side RPC dispatch: weighted node selection over dynamic membership,
//! plus bounded, health-aware connection pooling per node.
//!
//! # Architecture Overview
//!
//! ```text
//!   membership source                       caller
//!   (static config / external)                │
//!          │                                  ▼
//!          ▼                          ┌──────────────┐
//!   ┌──────────────┐   per-consumer   │  dispatch    │
//!   │ discovery    │──── inbox ──────▶│  Dispatcher  │── evict pool on removal
//!   │ bus          │                  └──────┬───────┘
//!   └──────┬───────┘                         │ pick(strategy, service)
//!          │ inbox                           ▼
//!          ▼                          ┌──────────────┐
//!   ┌──────────────┐                  │load_balancer │
//!   │ BalancerGroup│◀─────────────────│ swrr/random/ │
//!   │ event loop   │                  │ round_robin  │
//!   └──────────────┘                  └──────┬───────┘
//!                                            │ Node
//!                                            ▼
//!                                     ┌──────────────┐     ┌───────────┐
//!                                     │ pool (per    │────▶│ transport │──▶ node
//!                                     │ address)     │     │ (tcp)     │
//!                                     └──────────────┘     └───────────┘
//! ```
//!
//! Cross-cutting: `config` (TOML, validation, hot reload), `observability`
//! (tracing, Prometheus metrics), `lifecycle` (startup, signals, shutdown).

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod pool;
pub mod transport;

pub use config::DispatchConfig;
pub use discovery::{MembershipBus, MembershipEvent, Node};
pub use dispatch::{Connector, DispatchError, Dispatcher};
pub use lifecycle::{Runtime, Shutdown};
pub use load_balancer::{BalancerError, BalancerGroup, Strategy, StrategyRegistry};
pub use pool::{Connection, ConnectionPool, PoolConfig, PoolError, Pooled};
pub use transport::TcpConnector;
