//! Transport implementations for the dispatcher.
//!
//! # Design Decisions
//! - Transports only open connections; framing and serialization belong to
//!   the caller's invoke closure
//! - Every connect has a deadline

pub mod tcp;

pub use tcp::TcpConnector;
