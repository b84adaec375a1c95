//! Breaker registry - per-route breaker state

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::circuit_breaker::{BreakerMetrics, BreakerState};
use crate::config::BreakerConfig;

/// Breaker identity: `(group_key, command_key)`
///
/// Breaker identity is route identity. The config values seen at first
/// creation size the breaker; later lookups with a differing config for
/// the same key reuse the existing state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakerKey {
    group: String,
    command: String,
}

impl BreakerKey {
    /// Create a key from its parts
    #[must_use]
    pub fn new(group: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            command: command.into(),
        }
    }

    /// Derive the key for a route config
    #[must_use]
    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.group_key.clone(), config.command_key.clone())
    }

    /// Group component
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Command component
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.command)
    }
}

/// Breaker registry - manages breaker state for all routes
pub struct BreakerRegistry {
    /// Breakers by key
    breakers: DashMap<BreakerKey, Arc<BreakerState>>,
}

impl BreakerRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    /// Get the breaker for a route, creating it on first sight
    ///
    /// At most one `BreakerState` exists per key for the registry's
    /// lifetime; concurrent first lookups race on the map entry, not on
    /// duplicate state.
    #[must_use]
    pub fn get_or_create(&self, config: &BreakerConfig) -> Arc<BreakerState> {
        let key = BreakerKey::from_config(config);
        if let Some(breaker) = self.breakers.get(&key) {
            return Arc::clone(&*breaker);
        }
        let entry = self
            .breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(BreakerState::new(key, config)));
        Arc::clone(&*entry)
    }

    /// Get a breaker by key, if it exists
    #[must_use]
    pub fn get(&self, key: &BreakerKey) -> Option<Arc<BreakerState>> {
        self.breakers.get(key).map(|b| Arc::clone(&*b))
    }

    /// All breakers
    #[must_use]
    pub fn all(&self) -> Vec<Arc<BreakerState>> {
        self.breakers.iter().map(|b| Arc::clone(&*b)).collect()
    }

    /// Metrics snapshots for every breaker, keyed by `group:command`
    #[must_use]
    pub fn statuses(&self) -> HashMap<String, BreakerMetrics> {
        self.breakers
            .iter()
            .map(|b| (b.key().to_string(), b.metrics()))
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
