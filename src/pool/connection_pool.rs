//! Bounded connection pool for a single target.
//!
//! # Responsibilities
//! - Hand out idle connections, create new ones up to `max_capacity`
//! - Park callers when the pool is exhausted until a release, close or deadline
//! - Discard unhealthy and stale connections, replacing them lazily
//! - Close everything exactly once on shutdown

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use crate::pool::config::PoolConfig;
use crate::pool::connection::{Connection, ConnectionFactory, ConnectionId, IdGenerator};
use crate::pool::error::{PoolError, PoolResult};
use crate::pool::pooled::Pooled;
use crate::pool::reaper;

/// An idle connection waiting in the pool.
struct IdleConn<C> {
    conn: C,
    id: ConnectionId,
    released_at: Instant,
}

/// Mutable pool state, always accessed under one lock.
struct PoolState<C> {
    /// Oldest release at the front.
    idle: VecDeque<IdleConn<C>>,
    /// Idle plus checked out plus slots reserved for in-flight creation.
    open: usize,
    closed: bool,
}

/// State shared by the pool handle, checkout guards and the reaper.
pub(crate) struct Shared<C: Connection> {
    pub(crate) config: PoolConfig,
    factory: Box<dyn ConnectionFactory<Conn = C>>,
    state: Mutex<PoolState<C>>,
    /// Signalled whenever a connection or a capacity slot frees up, and on close.
    released: Notify,
    ids: IdGenerator,
}

/// Outcome of one checkout attempt under the lock.
enum Checkout<C> {
    Idle(IdleConn<C>),
    Create,
    Wait,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
    pub max_capacity: usize,
    pub closed: bool,
}

impl<C: Connection> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout(&self) -> PoolResult<Checkout<C>> {
        let mut stale = Vec::new();
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }

            let mut fresh = None;
            // Most recently released first; once one is stale, so is the rest.
            while let Some(entry) = state.idle.pop_back() {
                if entry.released_at.elapsed() > self.config.idle_timeout {
                    state.open -= 1;
                    stale.push(entry);
                } else {
                    fresh = Some(entry);
                    break;
                }
            }

            match fresh {
                Some(entry) => Checkout::Idle(entry),
                None if state.open < self.config.max_capacity => {
                    state.open += 1;
                    Checkout::Create
                }
                None => Checkout::Wait,
            }
        };

        for entry in stale {
            tracing::trace!(connection_id = %entry.id, "Discarding stale idle connection");
            entry.conn.close();
        }
        Ok(outcome)
    }

    /// Return a checked-out connection.
    pub(crate) fn release(&self, conn: C, id: ConnectionId, healthy: bool) {
        let mut state = self.lock();
        if state.closed || !healthy {
            state.open -= 1;
            drop(state);
            tracing::debug!(connection_id = %id, healthy, "Closing released connection");
            conn.close();
            self.released.notify_one();
            return;
        }

        state.idle.push_back(IdleConn {
            conn,
            id,
            released_at: Instant::now(),
        });
        drop(state);
        self.released.notify_one();
    }

    /// Give back a slot reserved for a connection that was never created.
    fn unreserve(&self) {
        self.lock().open -= 1;
        self.released.notify_one();
    }

    /// Close idle connections past `idle_timeout`, keeping at least
    /// `initial_capacity` open. Returns `None` once the pool is closed.
    pub(crate) fn sweep_idle(&self) -> Option<usize> {
        let expired: Vec<IdleConn<C>> = {
            let mut state = self.lock();
            if state.closed {
                return None;
            }
            let mut expired = Vec::new();
            while state.open > self.config.initial_capacity {
                let front_expired = state
                    .idle
                    .front()
                    .is_some_and(|entry| entry.released_at.elapsed() > self.config.idle_timeout);
                if !front_expired {
                    break;
                }
                if let Some(entry) = state.idle.pop_front() {
                    state.open -= 1;
                    expired.push(entry);
                }
            }
            expired
        };

        let count = expired.len();
        for entry in expired {
            entry.conn.close();
        }
        if count > 0 {
            // Freed capacity may unblock a waiter.
            self.released.notify_one();
        }
        Some(count)
    }

    fn close(&self) -> bool {
        let drained: Vec<IdleConn<C>> = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.open -= drained.len();
            drained
        };

        let count = drained.len();
        for entry in drained {
            entry.conn.close();
        }
        self.released.notify_waiters();
        tracing::debug!(closed_idle = count, "Connection pool closed");
        true
    }
}

/// Releases a reserved capacity slot unless disarmed. Keeps `open` accurate
/// when a caller is cancelled while the factory is still running.
struct Reservation<'a, C: Connection> {
    shared: &'a Shared<C>,
    armed: bool,
}

impl<C: Connection> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.unreserve();
        }
    }
}

/// A bounded, health-aware pool of connections to one target.
///
/// Dropping the pool closes it.
pub struct ConnectionPool<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> ConnectionPool<C> {
    /// Validate `config`, eagerly open `initial_capacity` connections and start
    /// the idle reaper.
    ///
    /// If any eager connection fails, the ones already opened are closed and
    /// the factory error is returned.
    pub async fn new<F>(factory: F, config: PoolConfig) -> PoolResult<Self>
    where
        F: ConnectionFactory<Conn = C>,
    {
        config.validate()?;

        let mut initial = Vec::with_capacity(config.initial_capacity);
        for _ in 0..config.initial_capacity {
            match factory.connect().await {
                Ok(conn) => initial.push(conn),
                Err(e) => {
                    for conn in initial {
                        conn.close();
                    }
                    return Err(PoolError::Connect(e));
                }
            }
        }

        let ids = IdGenerator::new();
        let now = Instant::now();
        let idle: VecDeque<_> = initial
            .into_iter()
            .map(|conn| IdleConn {
                conn,
                id: ids.next(),
                released_at: now,
            })
            .collect();

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                open: idle.len(),
                idle,
                closed: false,
            }),
            config,
            factory: Box::new(factory),
            released: Notify::new(),
            ids,
        });

        reaper::spawn(&shared);

        tracing::debug!(
            initial = shared.config.initial_capacity,
            max = shared.config.max_capacity,
            idle_timeout = ?shared.config.idle_timeout,
            "Connection pool created"
        );
        Ok(Self { shared })
    }

    /// Acquire a connection, waiting as long as it takes.
    ///
    /// Dropping the returned future cancels the wait.
    pub async fn get(&self) -> PoolResult<Pooled<C>> {
        self.acquire(None).await
    }

    /// Acquire a connection, failing with `Timeout` after `timeout`.
    pub async fn get_timeout(&self, timeout: Duration) -> PoolResult<Pooled<C>> {
        self.acquire(Some((Instant::now() + timeout, timeout))).await
    }

    async fn acquire(&self, deadline: Option<(Instant, Duration)>) -> PoolResult<Pooled<C>> {
        loop {
            // Register interest before looking, so a release between the
            // check and the wait is not missed.
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.checkout()? {
                Checkout::Idle(entry) => {
                    return Ok(Pooled::new(entry.conn, entry.id, Arc::clone(&self.shared)));
                }
                Checkout::Create => return self.create().await,
                Checkout::Wait => {}
            }

            match deadline {
                Some((at, timeout)) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Err(PoolError::Timeout(timeout));
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Open a new connection into an already reserved slot.
    async fn create(&self) -> PoolResult<Pooled<C>> {
        let mut reservation = Reservation {
            shared: &self.shared,
            armed: true,
        };

        let conn = self.shared.factory.connect().await.map_err(PoolError::Connect)?;

        if self.shared.lock().closed {
            // Reservation drop gives the slot back.
            conn.close();
            return Err(PoolError::Closed);
        }
        reservation.armed = false;

        let id = self.shared.ids.next();
        tracing::trace!(connection_id = %id, "Opened new pooled connection");
        Ok(Pooled::new(conn, id, Arc::clone(&self.shared)))
    }

    /// Return a connection to the pool. Equivalent to dropping it.
    pub fn put(&self, conn: Pooled<C>) {
        debug_assert!(
            conn.belongs_to(&self.shared),
            "connection returned to a pool that did not create it"
        );
        drop(conn);
    }

    /// Mark a checked-out connection as broken; it is discarded on release.
    pub fn mark_unhealthy(&self, conn: &mut Pooled<C>) {
        conn.mark_unhealthy();
    }

    /// Number of idle connections ready for immediate reuse.
    pub fn available(&self) -> usize {
        self.shared.lock().idle.len()
    }

    /// Configured maximum number of open connections.
    pub fn capacity(&self) -> usize {
        self.shared.config.max_capacity
    }

    /// Currently open connections (idle and checked out).
    pub fn open_count(&self) -> usize {
        self.shared.lock().open
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            open: state.open,
            idle: state.idle.len(),
            max_capacity: self.shared.config.max_capacity,
            closed: state.closed,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Close the pool. Idempotent.
    ///
    /// Idle connections are closed now, checked-out ones when released, and
    /// every waiting `get` fails with `Closed`.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl<C: Connection> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<C: Connection> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
