//! Balancer group.
//!
//! # Responsibilities
//! - Own one strategy instance per (service, strategy name)
//! - Apply membership events to every configured strategy of a service
//! - Route picks to the right instance

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use crate::discovery::{MembershipEvent, Node};
use crate::load_balancer::registry::{normalize, StrategyBuilder};
use crate::load_balancer::{BalancerError, Strategy, StrategyRegistry};

type SlotKey = (String, String);
type Slot = Mutex<Box<dyn Strategy>>;

/// Routes selections to per-service strategy instances.
pub struct BalancerGroup {
    /// Enabled strategy names, normalized, in configuration order.
    strategies: Vec<String>,
    builders: Vec<StrategyBuilder>,
    /// (service, strategy) → instance.
    slots: DashMap<SlotKey, Slot>,
}

impl BalancerGroup {
    /// Create a group with the given enabled strategies.
    ///
    /// Fails with `StrategyNotFound` if a name is not in the registry.
    pub fn new<S: AsRef<str>>(
        registry: &StrategyRegistry,
        strategies: &[S],
    ) -> Result<Self, BalancerError> {
        let mut enabled: Vec<String> = Vec::with_capacity(strategies.len());
        let mut builders = Vec::with_capacity(strategies.len());
        for name in strategies {
            let name = normalize(name.as_ref());
            if enabled.contains(&name) {
                continue;
            }
            let builder = registry
                .builder(&name)
                .ok_or_else(|| BalancerError::StrategyNotFound { strategy: name.clone() })?;
            enabled.push(name);
            builders.push(builder);
        }

        Ok(Self {
            strategies: enabled,
            builders,
            slots: DashMap::new(),
        })
    }

    /// Enabled strategy names.
    pub fn strategies(&self) -> &[String] {
        &self.strategies
    }

    /// Normalized name of an enabled strategy, or `None` if `strategy` is
    /// not enabled.
    pub fn enabled_name(&self, strategy: &str) -> Option<&str> {
        self.resolve(strategy).ok().map(|idx| self.strategies[idx].as_str())
    }

    /// Apply one membership event to every enabled strategy of its service.
    pub fn apply(&self, event: &MembershipEvent) {
        let node = event.node();
        for (idx, name) in self.strategies.iter().enumerate() {
            let slot = self
                .slots
                .entry((node.service_name.clone(), name.clone()))
                .or_insert_with(|| self.build_slot(idx, &node.service_name));
            let mut strategy = lock(&slot);
            match event {
                MembershipEvent::AddService(node) => strategy.add(node.clone()),
                MembershipEvent::UpdateService(node) => strategy.update(node.clone()),
                MembershipEvent::RmvService(node) => strategy.rmv(&node.id),
            }
        }

        tracing::debug!(
            kind = event.kind(),
            service = %node.service_name,
            node_id = %node.id,
            weight = node.weight,
            "Membership event applied"
        );
    }

    /// Select a node of `service` with the named strategy.
    pub fn pick(&self, strategy: &str, service: &str) -> Result<Node, BalancerError> {
        let idx = self.resolve(strategy)?;
        let key = (service.to_string(), self.strategies[idx].clone());

        if let Some(slot) = self.slots.get(&key) {
            let picked = lock(&slot).pick();
            return picked;
        }

        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| self.build_slot(idx, service));
        let picked = lock(&slot).pick();
        picked
    }

    /// Snapshot of the nodes a strategy currently holds for `service`.
    pub fn nodes(&self, strategy: &str, service: &str) -> Result<Vec<Node>, BalancerError> {
        let idx = self.resolve(strategy)?;
        let key = (service.to_string(), self.strategies[idx].clone());
        match self.slots.get(&key) {
            Some(slot) => {
                let nodes = lock(&slot).nodes();
                Ok(nodes)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Services with at least one strategy instance, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.slots.iter().map(|e| e.key().0.clone()).collect();
        services.sort();
        services.dedup();
        services
    }

    /// Consume membership events from `inbox` until it closes or shutdown fires.
    ///
    /// Events are applied one at a time in arrival order.
    pub fn spawn(
        self: Arc<Self>,
        mut inbox: mpsc::UnboundedReceiver<MembershipEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(strategies = ?self.strategies, "Balancer group listening for membership events");
            loop {
                tokio::select! {
                    event = inbox.recv() => match event {
                        Some(event) => self.apply(&event),
                        None => {
                            tracing::info!("Membership feed closed, balancer group stopping");
                            break;
                        }
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Balancer group received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    /// Index of an enabled strategy.
    fn resolve(&self, strategy: &str) -> Result<usize, BalancerError> {
        let name = normalize(strategy);
        self.strategies
            .iter()
            .position(|enabled| *enabled == name)
            .ok_or_else(|| BalancerError::StrategyNotFound { strategy: strategy.to_string() })
    }

    fn build_slot(&self, idx: usize, service: &str) -> Slot {
        tracing::debug!(service = %service, strategy = %self.strategies[idx], "Creating strategy instance");
        Mutex::new((self.builders[idx])(service))
    }
}

impl std::fmt::Debug for BalancerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancerGroup")
            .field("strategies", &self.strategies)
            .field("slots", &self.slots.len())
            .finish()
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Box<dyn Strategy>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
