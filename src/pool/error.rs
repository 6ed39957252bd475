//! Connection pool errors.

use std::time::Duration;
use thiserror::Error;
use crate::pool::connection::BoxError;

/// Errors that can occur in the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid pool parameters; no pool was created.
    #[error("invalid pool configuration: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    /// No connection became available before the deadline.
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// The pool has been closed.
    #[error("connection pool is closed")]
    Closed,

    /// The connection factory failed.
    #[error("failed to open connection: {0}")]
    Connect(#[source] BoxError),
}

impl PoolError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        PoolError::Config {
            message: message.into(),
        }
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
