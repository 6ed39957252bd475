//! Dispatch errors.

use thiserror::Error;
use crate::load_balancer::BalancerError;
use crate::pool::{BoxError, PoolError};

/// Errors returned by [`Dispatcher`](super::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Node selection failed.
    #[error(transparent)]
    Balancer(#[from] BalancerError),

    /// Connection acquisition failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The caller's invocation failed; the connection was discarded.
    #[error("invocation on {node} failed: {source}")]
    Invoke {
        node: String,
        #[source]
        source: BoxError,
    },
}
