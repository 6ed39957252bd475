//! Pool parameters and their validation.

use std::time::Duration;
use crate::pool::error::{PoolError, PoolResult};

const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);
const MAX_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Validated-at-construction pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections created eagerly, and the floor the idle reaper keeps.
    pub initial_capacity: usize,
    /// Upper bound on open connections (idle + checked out).
    pub max_capacity: usize,
    /// How long a connection may sit idle before it is reclaimed.
    pub idle_timeout: Duration,
    /// Sweep cadence of the idle reaper. Derived from `idle_timeout` if unset.
    pub reap_interval: Option<Duration>,
}

impl PoolConfig {
    pub fn new(initial_capacity: usize, max_capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            initial_capacity,
            max_capacity,
            idle_timeout,
            reap_interval: None,
        }
    }

    /// Check the invariants the pool relies on.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_capacity == 0 {
            return Err(PoolError::config("max_capacity must be greater than 0"));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(PoolError::config(format!(
                "initial_capacity ({}) exceeds max_capacity ({})",
                self.initial_capacity, self.max_capacity
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(PoolError::config("idle_timeout must be greater than 0"));
        }
        if matches!(self.reap_interval, Some(interval) if interval.is_zero()) {
            return Err(PoolError::config("reap_interval must be greater than 0"));
        }
        Ok(())
    }

    /// Effective sweep cadence: half the idle timeout, clamped.
    pub fn reap_interval(&self) -> Duration {
        self.reap_interval
            .unwrap_or_else(|| (self.idle_timeout / 2).clamp(MIN_REAP_INTERVAL, MAX_REAP_INTERVAL))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(0, 16, Duration::from_secs(120))
    }
}
