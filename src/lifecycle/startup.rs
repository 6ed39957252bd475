//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the strategy registry, balancer group and dispatcher from config
//! - Wire both consumers to the membership bus and start their tasks
//! - Publish the static node list
//! - Apply reloaded configs and stop everything in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Consumers subscribe before the first event is published
//! - Only the node list is applied on reload

use std::sync::{Arc, Mutex, PoisonError};
use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::task::JoinHandle;
use crate::config::DispatchConfig;
use crate::discovery::{MembershipBus, StaticDiscovery};
use crate::dispatch::{Connector, Dispatcher};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::{BalancerError, BalancerGroup, StrategyRegistry};
use crate::pool::PoolError;
use crate::transport::TcpConnector;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("balancer setup failed: {0}")]
    Balancer(#[from] BalancerError),

    #[error("pool setup failed: {0}")]
    Pool(#[from] PoolError),
}

/// A running dispatch stack.
pub struct Runtime<K: Connector = TcpConnector> {
    config: ArcSwap<DispatchConfig>,
    bus: MembershipBus,
    discovery: Mutex<StaticDiscovery>,
    dispatcher: Arc<Dispatcher<K>>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime<TcpConnector> {
    /// Start with the bundled TCP transport.
    pub fn start(config: DispatchConfig) -> Result<Self, StartupError> {
        let connector = TcpConnector::new(config.pool.connect_timeout());
        Self::start_with(config, connector)
    }
}

impl<K: Connector> Runtime<K> {
    /// Start with the built-in strategies and a caller-supplied connector.
    pub fn start_with(config: DispatchConfig, connector: K) -> Result<Self, StartupError> {
        Self::start_with_registry(config, connector, &StrategyRegistry::with_defaults())
    }

    /// Start with a custom strategy registry.
    ///
    /// Must be called within a tokio runtime.
    pub fn start_with_registry(
        config: DispatchConfig,
        connector: K,
        registry: &StrategyRegistry,
    ) -> Result<Self, StartupError> {
        let group = Arc::new(BalancerGroup::new(registry, &config.balancer.strategies)?);

        let mut dispatcher = Dispatcher::new(Arc::clone(&group), connector, config.pool.pool_config())?;
        if let Some(timeout) = config.pool.acquire_timeout() {
            dispatcher = dispatcher.with_acquire_timeout(timeout);
        }
        let dispatcher = Arc::new(dispatcher);

        let bus = MembershipBus::new();
        let shutdown = Shutdown::new();
        let tasks = vec![
            Arc::clone(&group).spawn(bus.subscribe(), shutdown.subscribe()),
            Arc::clone(&dispatcher).spawn(bus.subscribe(), shutdown.subscribe()),
        ];

        let mut discovery = StaticDiscovery::new();
        discovery.sync(&config.nodes, &bus);

        tracing::info!(
            strategies = ?group.strategies(),
            nodes = discovery.len(),
            "Dispatch runtime started"
        );

        Ok(Self {
            config: ArcSwap::from_pointee(config),
            bus,
            discovery: Mutex::new(discovery),
            dispatcher,
            shutdown,
            tasks,
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<K>> {
        &self.dispatcher
    }

    pub fn bus(&self) -> &MembershipBus {
        &self.bus
    }

    /// Currently applied configuration.
    pub fn config(&self) -> Arc<DispatchConfig> {
        self.config.load_full()
    }

    /// Strategy used when a caller names none.
    pub fn default_strategy(&self) -> String {
        self.config.load().balancer.default_strategy.clone()
    }

    /// Apply a reloaded configuration. Returns the number of membership
    /// events published.
    pub fn reload(&self, config: DispatchConfig) -> usize {
        let current = self.config.load();
        if current.balancer != config.balancer || current.pool != config.pool {
            tracing::warn!("Balancer and pool settings changed; they take effect after a restart");
        }

        let published = self
            .discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sync(&config.nodes, &self.bus);
        self.config.store(Arc::new(config));
        published
    }

    /// Signal background tasks, wait for them, then close every pool.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
        self.dispatcher.close();
        tracing::info!("Dispatch runtime stopped");
    }
}

impl<K: Connector> std::fmt::Debug for Runtime<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("dispatcher", &self.dispatcher)
            .field("subscribers", &self.bus.subscriber_count())
            .finish()
    }
}
