//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → registry, group, dispatcher → subscribe to bus
//!     → spawn consumers → publish static nodes
//!
//! Reload (startup.rs):
//!     New config → swap → diff node list → publish events
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop consumers → close pools → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then consumers, then membership
//! - Ordered shutdown: stop consumers, then close pools

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Runtime, StartupError};
