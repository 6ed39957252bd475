//! Dispatcher.
//!
//! # Responsibilities
//! - Pick a node through the balancer group
//! - Keep one connection pool per node address, created on first use
//! - Run the caller's invocation and mark failed connections unhealthy
//! - Evict pools of removed nodes and of addresses a node moved away from

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use crate::discovery::{MembershipEvent, Node};
use crate::dispatch::{Connector, DispatchError};
use crate::load_balancer::BalancerGroup;
use crate::observability::metrics;
use crate::pool::{BoxError, ConnectionPool, PoolConfig, PoolError, PoolStats, Pooled};

/// Explicit dispatch handle tying node selection to connection pools.
pub struct Dispatcher<K: Connector> {
    group: Arc<BalancerGroup>,
    connector: Arc<K>,
    pool_config: PoolConfig,
    /// address → pool
    pools: DashMap<String, Arc<ConnectionPool<K::Conn>>>,
    /// (service, node id) → address, as last seen on the membership feed
    known: DashMap<(String, String), String>,
    acquire_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl<K: Connector> Dispatcher<K> {
    /// Create a dispatcher. `pool_config` is validated up front so a bad
    /// configuration fails here instead of on the first call.
    pub fn new(
        group: Arc<BalancerGroup>,
        connector: K,
        pool_config: PoolConfig,
    ) -> Result<Self, PoolError> {
        pool_config.validate()?;
        Ok(Self {
            group,
            connector: Arc::new(connector),
            pool_config,
            pools: DashMap::new(),
            known: DashMap::new(),
            acquire_timeout: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Bound every pool wait by `timeout`.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn group(&self) -> &Arc<BalancerGroup> {
        &self.group
    }

    /// Select a node for `service` and check out a connection to it.
    pub async fn acquire(
        &self,
        strategy: &str,
        service: &str,
    ) -> Result<(Node, Pooled<K::Conn>), DispatchError> {
        if self.is_closed() {
            return Err(PoolError::Closed.into());
        }

        let label = self.group.enabled_name(strategy).unwrap_or("unknown");
        let node = match self.group.pick(strategy, service) {
            Ok(node) => {
                metrics::record_pick(service, label, true);
                node
            }
            Err(e) => {
                metrics::record_pick(service, label, false);
                return Err(e.into());
            }
        };

        let pool = self.pool_for(&node.address).await?;
        let result = match self.acquire_timeout {
            Some(timeout) => pool.get_timeout(timeout).await,
            None => pool.get().await,
        };

        match result {
            Ok(conn) => {
                metrics::record_acquire(&node.address, "ok");
                metrics::record_pool_idle(&node.address, pool.available());
                tracing::trace!(node = %node, connection_id = %conn.id(), "Connection acquired");
                Ok((node, conn))
            }
            Err(e) => {
                metrics::record_acquire(&node.address, acquire_outcome(&e));
                Err(e.into())
            }
        }
    }

    /// Pick a node, acquire a connection and run `invoke` on it.
    ///
    /// On success the connection goes back to its pool. On failure it is
    /// marked unhealthy and discarded; the error is returned without retry.
    pub async fn call<R, F>(&self, strategy: &str, service: &str, invoke: F) -> Result<R, DispatchError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut K::Conn) -> BoxFuture<'c, Result<R, BoxError>>,
    {
        let (node, mut conn) = self.acquire(strategy, service).await?;

        let outcome = invoke(&mut *conn).await;
        match outcome {
            Ok(value) => {
                conn.put();
                Ok(value)
            }
            Err(source) => {
                conn.mark_unhealthy();
                metrics::record_discard(&node.address, "invoke_error");
                drop(conn);
                Err(DispatchError::Invoke {
                    node: node.to_string(),
                    source,
                })
            }
        }
    }

    /// Close and forget the pool for `address`. Returns whether one existed.
    pub fn evict(&self, address: &str) -> bool {
        match self.pools.remove(address) {
            Some((_, pool)) => {
                pool.close();
                tracing::debug!(address = %address, "Evicted connection pool");
                true
            }
            None => false,
        }
    }

    /// React to a membership event.
    ///
    /// When a node is removed, or updated to a different address, the pool
    /// for the address it left is evicted unless another known node still
    /// uses it.
    pub fn apply(&self, event: &MembershipEvent) {
        let node = event.node();
        let key = (node.service_name.clone(), node.id.clone());
        let left = match event {
            MembershipEvent::AddService(_) | MembershipEvent::UpdateService(_) => self
                .known
                .insert(key, node.address.clone())
                .filter(|previous| *previous != node.address),
            MembershipEvent::RmvService(_) => Some(
                self.known
                    .remove(&key)
                    .map_or_else(|| node.address.clone(), |(_, address)| address),
            ),
        };

        let Some(address) = left else {
            return;
        };
        if self.address_in_use(&address, node) {
            return;
        }
        if self.evict(&address) && matches!(event, MembershipEvent::UpdateService(_)) {
            tracing::info!(node = %node, previous = %address, "Node moved, old pool evicted");
        }
    }

    /// Consume membership events until the inbox closes or shutdown fires.
    pub fn spawn(
        self: Arc<Self>,
        mut inbox: mpsc::UnboundedReceiver<MembershipEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = inbox.recv() => match event {
                        Some(event) => self.apply(&event),
                        None => break,
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Dispatcher received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    /// Per-address pool statistics, sorted by address.
    pub fn stats(&self) -> Vec<(String, PoolStats)> {
        let mut stats: Vec<_> = self
            .pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every pool. Idempotent; later calls fail with `Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let addresses: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        for address in &addresses {
            self.evict(address);
        }
        tracing::info!(pools = addresses.len(), "Dispatcher closed");
    }

    /// Existing pool for `address`, or a new one.
    ///
    /// The pool is built outside the map so no shard lock is held across the
    /// eager connects; if another task wins the race, the spare pool is
    /// dropped, which closes it.
    async fn pool_for(&self, address: &str) -> Result<Arc<ConnectionPool<K::Conn>>, PoolError> {
        if let Some(pool) = self.pools.get(address) {
            if !pool.is_closed() {
                return Ok(Arc::clone(pool.value()));
            }
        }

        let connector = Arc::clone(&self.connector);
        let target = address.to_string();
        let factory = move || connector.connect(&target);
        let created = Arc::new(ConnectionPool::new(factory, self.pool_config.clone()).await?);

        let pool = match self.pools.entry(address.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    entry.insert(Arc::clone(&created));
                    created
                } else {
                    Arc::clone(entry.get())
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&created));
                tracing::debug!(address = %address, "Created connection pool");
                created
            }
        };

        if self.is_closed() {
            self.evict(address);
            return Err(PoolError::Closed);
        }
        Ok(pool)
    }

    /// Whether a node other than `except` is known at `address`.
    ///
    /// Only this dispatcher's own feed is consulted; the group applies the
    /// same events on another task and may lag behind.
    fn address_in_use(&self, address: &str, except: &Node) -> bool {
        self.known.iter().any(|entry| {
            let (service, id) = entry.key();
            entry.value() == address && !(*service == except.service_name && *id == except.id)
        })
    }
}

impl<K: Connector> Drop for Dispatcher<K> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<K: Connector> std::fmt::Debug for Dispatcher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("group", &self.group)
            .field("pools", &self.pools.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn acquire_outcome(error: &PoolError) -> &'static str {
    match error {
        PoolError::Timeout(_) => "timeout",
        PoolError::Closed => "closed",
        PoolError::Connect(_) => "connect_error",
        PoolError::Config { .. } => "config_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use crate::load_balancer::{BalancerError, StrategyRegistry};
    use crate::pool::Connection;

    #[derive(Debug)]
    struct MockConn {
        address: String,
    }

    impl Connection for MockConn {}

    /// Records every address it connects to; fails for addresses in `down`.
    #[derive(Debug, Default)]
    struct MockConnector {
        connects: Arc<Mutex<Vec<String>>>,
        down: Vec<String>,
    }

    impl Connector for MockConnector {
        type Conn = MockConn;

        fn connect(&self, address: &str) -> BoxFuture<'static, Result<MockConn, BoxError>> {
            self.connects.lock().unwrap().push(address.to_string());
            let address = address.to_string();
            let down = self.down.contains(&address);
            Box::pin(async move {
                if down {
                    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "down").into())
                } else {
                    Ok(MockConn { address })
                }
            })
        }
    }

    fn group() -> Arc<BalancerGroup> {
        let registry = StrategyRegistry::with_defaults();
        let group = BalancerGroup::new(&registry, &["swrr"]).unwrap();
        group.apply(&MembershipEvent::AddService(Node::new("a", "10.0.0.1:7000", 4, "echo")));
        group.apply(&MembershipEvent::AddService(Node::new("b", "10.0.0.2:7000", 2, "echo")));
        Arc::new(group)
    }

    fn dispatcher(connector: MockConnector) -> Dispatcher<MockConnector> {
        let group = group();
        let dispatcher =
            Dispatcher::new(Arc::clone(&group), connector, PoolConfig::new(0, 2, Duration::from_secs(60)))
                .unwrap();
        for strategy in group.strategies() {
            for node in group.nodes(strategy, "echo").unwrap() {
                dispatcher.apply(&MembershipEvent::AddService(node));
            }
        }
        dispatcher
    }

    /// Deliver `event` to the group and then the dispatcher, as the bus would.
    fn deliver(dispatcher: &Dispatcher<MockConnector>, event: MembershipEvent) {
        dispatcher.group().apply(&event);
        dispatcher.apply(&event);
    }

    fn addresses(dispatcher: &Dispatcher<MockConnector>) -> Vec<String> {
        dispatcher.stats().into_iter().map(|(address, _)| address).collect()
    }

    #[test]
    fn invalid_pool_config_is_rejected() {
        let result = Dispatcher::new(
            group(),
            MockConnector::default(),
            PoolConfig::new(0, 0, Duration::from_secs(60)),
        );
        assert!(matches!(result, Err(PoolError::Config { .. })));
    }

    #[tokio::test]
    async fn acquire_connects_to_the_picked_node() {
        let dispatcher = dispatcher(MockConnector::default());

        let (node, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        assert_eq!(node.id, "a");
        assert_eq!(conn.address, "10.0.0.1:7000");
        drop(conn);

        let (node, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        assert_eq!(node.id, "b");
        assert_eq!(conn.address, "10.0.0.2:7000");
    }

    #[tokio::test]
    async fn pools_are_reused_per_address() {
        let connector = MockConnector::default();
        let connects = Arc::clone(&connector.connects);
        let dispatcher = dispatcher(connector);

        for _ in 0..6 {
            let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
            conn.put();
        }

        // One connection per address, recycled through idle.
        assert_eq!(connects.lock().unwrap().len(), 2);
        let stats = dispatcher.stats();
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|(_, s)| s.open == 1 && s.idle == 1));
    }

    #[tokio::test]
    async fn failed_invoke_discards_connection() {
        let connector = MockConnector::default();
        let connects = Arc::clone(&connector.connects);
        let dispatcher = dispatcher(connector);

        let err = dispatcher
            .call("swrr", "echo", |_conn| {
                Box::pin(async { Err::<(), BoxError>("broken pipe".into()) })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Invoke { ref node, .. } if node.contains("/a@")));

        let stats = dispatcher.stats();
        assert_eq!(stats[0].1.open, 0);
        assert_eq!(connects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn successful_invoke_returns_value_and_recycles() {
        let dispatcher = dispatcher(MockConnector::default());

        let address = dispatcher
            .call("swrr", "echo", |conn| {
                Box::pin(async move { Ok::<_, BoxError>(conn.address.clone()) })
            })
            .await
            .unwrap();
        assert_eq!(address, "10.0.0.1:7000");

        let stats = dispatcher.stats();
        assert_eq!(stats[0].1.idle, 1);
    }

    #[tokio::test]
    async fn selection_errors_pass_through() {
        let dispatcher = dispatcher(MockConnector::default());

        let err = dispatcher.acquire("swrr", "missing").await.unwrap_err();
        assert!(matches!(err, DispatchError::Balancer(BalancerError::NoAvailableNode { .. })));

        let err = dispatcher.acquire("p2c", "echo").await.unwrap_err();
        assert!(matches!(err, DispatchError::Balancer(BalancerError::StrategyNotFound { .. })));
    }

    #[tokio::test]
    async fn connect_failure_surfaces_as_pool_error() {
        let connector = MockConnector {
            down: vec!["10.0.0.1:7000".to_string()],
            ..Default::default()
        };
        let dispatcher = dispatcher(connector);

        let err = dispatcher.acquire("swrr", "echo").await.unwrap_err();
        assert!(matches!(err, DispatchError::Pool(PoolError::Connect(_))));
    }

    #[tokio::test]
    async fn acquire_timeout_applies() {
        let dispatcher = Dispatcher::new(
            group(),
            MockConnector::default(),
            PoolConfig::new(0, 1, Duration::from_secs(60)),
        )
        .unwrap()
        .with_acquire_timeout(Duration::from_millis(20));

        // a, b, a: the third pick hits a's pool while its only slot is held.
        let (_, held) = dispatcher.acquire("swrr", "echo").await.unwrap();
        let (_, other) = dispatcher.acquire("swrr", "echo").await.unwrap();
        drop(other);
        let err = dispatcher.acquire("swrr", "echo").await.unwrap_err();
        assert!(matches!(err, DispatchError::Pool(PoolError::Timeout(_))));
        drop(held);
    }

    #[tokio::test]
    async fn removal_evicts_pool() {
        let dispatcher = dispatcher(MockConnector::default());
        let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        conn.put();
        assert_eq!(dispatcher.stats().len(), 1);

        deliver(&dispatcher, MembershipEvent::RmvService(Node::new("a", "10.0.0.1:7000", 4, "echo")));

        assert!(dispatcher.stats().is_empty());
        assert!(!dispatcher.evict("10.0.0.1:7000"));
    }

    #[tokio::test]
    async fn address_change_evicts_old_pool() {
        let dispatcher = dispatcher(MockConnector::default());
        let (node, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        assert_eq!(node.id, "a");
        conn.put();
        assert_eq!(addresses(&dispatcher), vec!["10.0.0.1:7000"]);

        deliver(&dispatcher, MembershipEvent::UpdateService(Node::new("a", "10.0.0.9:7000", 4, "echo")));
        assert!(dispatcher.stats().is_empty());

        // a holds two thirds of the weight, so three picks reach it.
        for _ in 0..3 {
            let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
            conn.put();
        }
        assert!(addresses(&dispatcher).contains(&"10.0.0.9:7000".to_string()));

        deliver(&dispatcher, MembershipEvent::RmvService(Node::new("a", "10.0.0.9:7000", 4, "echo")));
        let remaining = addresses(&dispatcher);
        assert!(!remaining.contains(&"10.0.0.1:7000".to_string()), "stale pools: {remaining:?}");
        assert!(!remaining.contains(&"10.0.0.9:7000".to_string()), "stale pools: {remaining:?}");
    }

    #[tokio::test]
    async fn weight_only_update_keeps_pool() {
        let dispatcher = dispatcher(MockConnector::default());
        let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        conn.put();

        deliver(&dispatcher, MembershipEvent::UpdateService(Node::new("a", "10.0.0.1:7000", 9, "echo")));
        assert_eq!(addresses(&dispatcher), vec!["10.0.0.1:7000"]);
    }

    #[tokio::test]
    async fn moving_onto_a_shared_address_keeps_it() {
        let dispatcher = dispatcher(MockConnector::default());
        for _ in 0..2 {
            let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
            conn.put();
        }

        // b moves onto a's address; b's old pool goes, a's stays.
        deliver(&dispatcher, MembershipEvent::UpdateService(Node::new("b", "10.0.0.1:7000", 2, "echo")));
        assert_eq!(addresses(&dispatcher), vec!["10.0.0.1:7000"]);

        // a leaves, but b still lives there.
        deliver(&dispatcher, MembershipEvent::RmvService(Node::new("a", "10.0.0.1:7000", 4, "echo")));
        assert_eq!(addresses(&dispatcher), vec!["10.0.0.1:7000"]);
    }

    #[tokio::test]
    async fn shared_address_survives_removal() {
        let dispatcher = dispatcher(MockConnector::default());
        deliver(&dispatcher, MembershipEvent::AddService(Node::new("c", "10.0.0.1:7000", 1, "other")));
        let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        conn.put();

        deliver(&dispatcher, MembershipEvent::RmvService(Node::new("a", "10.0.0.1:7000", 4, "echo")));

        assert_eq!(dispatcher.stats().len(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let dispatcher = dispatcher(MockConnector::default());
        let (_, conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        conn.put();

        dispatcher.close();
        dispatcher.close();

        assert!(dispatcher.stats().is_empty());
        let err = dispatcher.acquire("swrr", "echo").await.unwrap_err();
        assert!(matches!(err, DispatchError::Pool(PoolError::Closed)));
    }
}
