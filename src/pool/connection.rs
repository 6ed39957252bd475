//! Connection and factory abstractions.
//!
//! # Responsibilities
//! - Define what the pool needs from a transport handle (close)
//! - Define how the pool creates handles (factory)
//! - Give every pooled handle an id for tracing

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use futures_util::future::BoxFuture;

/// Boxed error produced by factories and invoke closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A transport handle managed by the pool.
///
/// Invocation is not part of this trait: callers use the concrete type
/// through the checkout guard.
pub trait Connection: Send + 'static {
    /// Release transport resources. The default just drops the handle.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Creates new connections to one target.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<C, E>>`, so a
/// closure is usually all that is needed.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Conn: Connection;

    fn connect(&self) -> BoxFuture<'static, Result<Self::Conn, BoxError>>;
}

impl<F, Fut, C, E> ConnectionFactory for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, E>> + Send + 'static,
    C: Connection,
    E: Into<BoxError>,
{
    type Conn = C;

    fn connect(&self) -> BoxFuture<'static, Result<C, BoxError>> {
        let fut = self();
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-pool id source. Relaxed ordering is enough: only uniqueness matters.
#[derive(Debug)]
pub(crate) struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> ConnectionId {
        ConnectionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}
