//! Strategy registry.
//!
//! Maps strategy names to constructors. Built once at startup and handed to
//! the balancer group; names are matched case-insensitively.

use std::collections::HashMap;
use std::sync::Arc;
use crate::load_balancer::{random, round_robin, swrr, Strategy};

/// Builds a fresh strategy instance for the given service name.
pub type StrategyBuilder = Arc<dyn Fn(&str) -> Box<dyn Strategy> + Send + Sync>;

/// Name → constructor table for strategies.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    builders: HashMap<String, StrategyBuilder>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the bundled strategies: `swrr`, `random` and `round_robin`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(swrr::NAME, |service| {
            Box::new(swrr::SmoothWeightedRoundRobin::new(service))
        });
        registry.register(random::NAME, |service| {
            Box::new(random::WeightedRandom::new(service))
        });
        registry.register(round_robin::NAME, |service| {
            Box::new(round_robin::RoundRobin::new(service))
        });
        registry
    }

    /// Register (or replace) a strategy constructor.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&str) -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        self.builders.insert(normalize(name), Arc::new(builder));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(&normalize(name))
    }

    /// Constructor registered under `name`.
    pub fn builder(&self, name: &str) -> Option<StrategyBuilder> {
        self.builders.get(&normalize(name)).cloned()
    }

    /// Build a strategy instance for `service`, or `None` for unknown names.
    pub fn build(&self, name: &str, service: &str) -> Option<Box<dyn Strategy>> {
        self.builders.get(&normalize(name)).map(|builder| builder(service))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.names())
            .finish()
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
