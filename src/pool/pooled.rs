//! Checkout guard for pooled connections.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use crate::pool::connection::{Connection, ConnectionId};
use crate::pool::connection_pool::Shared;

/// A connection checked out of a pool.
///
/// Owned by exactly one caller; returned to its pool on `put` or drop. A
/// connection marked unhealthy is closed on release instead of recycled.
pub struct Pooled<C: Connection> {
    /// Always `Some` until released.
    conn: Option<C>,
    id: ConnectionId,
    healthy: bool,
    pool: Arc<Shared<C>>,
}

impl<C: Connection> Pooled<C> {
    pub(crate) fn new(conn: C, id: ConnectionId, pool: Arc<Shared<C>>) -> Self {
        Self {
            conn: Some(conn),
            id,
            healthy: true,
            pool,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Flag the connection as broken. It will be closed on release and the
    /// pool will open a replacement on a later `get`.
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    /// Return the connection to its pool.
    pub fn put(self) {
        drop(self);
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<Shared<C>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl<C: Connection> Deref for Pooled<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl<C: Connection> DerefMut for Pooled<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl<C: Connection> Drop for Pooled<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.id, self.healthy);
        }
    }
}

impl<C: Connection> std::fmt::Debug for Pooled<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("healthy", &self.healthy)
            .finish_non_exhaustive()
    }
}
