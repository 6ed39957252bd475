//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that strategy names exist and the default one is enabled
//! - Validate value ranges (capacities, timeouts, addresses)
//! - Detect duplicate nodes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::DispatchConfig;
use crate::load_balancer::registry::normalize;
use crate::load_balancer::StrategyRegistry;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("balancer.strategies must not be empty")]
    NoStrategies,

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("default strategy '{0}' is not in balancer.strategies")]
    DefaultStrategyDisabled(String),

    #[error("pool: {0}")]
    Pool(String),

    #[error("pool.connect_timeout_ms must be greater than zero")]
    ZeroConnectTimeout,

    #[error("node '{service}/{id}': {reason}")]
    InvalidNode {
        service: String,
        id: String,
        reason: String,
    },

    #[error("duplicate node '{service}/{id}'")]
    DuplicateNode { service: String, id: String },

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Validate against the built-in strategy set.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    validate_with_registry(config, &StrategyRegistry::with_defaults())
}

/// Validate against a caller-supplied registry, for setups that register
/// their own strategies.
pub fn validate_with_registry(
    config: &DispatchConfig,
    registry: &StrategyRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let balancer = &config.balancer;
    if balancer.strategies.is_empty() {
        errors.push(ValidationError::NoStrategies);
    }
    for name in &balancer.strategies {
        if !registry.contains(name) {
            errors.push(ValidationError::UnknownStrategy(name.clone()));
        }
    }
    let default = normalize(&balancer.default_strategy);
    if !balancer.strategies.iter().any(|s| normalize(s) == default) {
        errors.push(ValidationError::DefaultStrategyDisabled(
            balancer.default_strategy.clone(),
        ));
    }

    if let Err(e) = config.pool.pool_config().validate() {
        errors.push(ValidationError::Pool(e.to_string()));
    }
    if config.pool.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.pool.acquire_timeout_ms == Some(0) {
        errors.push(ValidationError::Pool(
            "acquire_timeout_ms must be greater than zero".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for node in &config.nodes {
        let invalid = |reason: &str| ValidationError::InvalidNode {
            service: node.service.clone(),
            id: node.id.clone(),
            reason: reason.to_string(),
        };
        if node.id.trim().is_empty() {
            errors.push(invalid("id must not be empty"));
        }
        if node.service.trim().is_empty() {
            errors.push(invalid("service must not be empty"));
        }
        if node.address.trim().is_empty() {
            errors.push(invalid("address must not be empty"));
        }
        if !seen.insert((node.service.as_str(), node.id.as_str())) {
            errors.push(ValidationError::DuplicateNode {
                service: node.service.clone(),
                id: node.id.clone(),
            });
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
