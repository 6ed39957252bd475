//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (service, address, connection_id) on every event
//! - Metrics are cheap (atomic increments)
//! - Core components log lifecycle only; errors are returned, not logged

pub mod logging;
pub mod metrics;
