//! Request/response exchange types
//!
//! An [`Exchange`] is the immutable snapshot of an inbound request that the
//! routing layer hands to the executor: enough to issue the downstream call
//! and to resume the plugin chain. The executor never mutates it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::chain::PluginChain;
use crate::config::BreakerConfig;

/// Immutable snapshot of an inbound request
#[derive(Debug, Clone)]
pub struct Exchange {
    /// HTTP method of the inbound request
    pub method: String,
    /// Fully-resolved downstream target URI
    pub target: Url,
    /// Request headers to forward
    pub headers: HashMap<String, String>,
    /// Remote peer address, when known
    pub remote_addr: Option<SocketAddr>,
    /// Request body, when present
    pub body: Option<Bytes>,
}

impl Exchange {
    /// Create a snapshot for a GET request with no body
    #[must_use]
    pub fn get(target: Url) -> Self {
        Self {
            method: "GET".to_string(),
            target,
            headers: HashMap::new(),
            remote_addr: None,
            body: None,
        }
    }
}

/// Owned downstream response
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    #[serde(skip)]
    pub body: Bytes,
}

impl BackendResponse {
    /// Build a response with a status and body, no headers
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Whether the status code is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-invocation context
///
/// Created at call entry by the routing layer, discarded after the outcome
/// is produced. Holds the exchange snapshot, the resolved breaker config
/// for the matched route, and the continuation resumed on success.
#[derive(Clone)]
pub struct InvocationContext {
    /// Request exchange snapshot
    pub exchange: Exchange,
    /// Resolved breaker configuration for the matched route
    pub config: BreakerConfig,
    /// Plugin chain continuation, invoked at most once on success
    pub chain: Arc<dyn PluginChain>,
}

impl InvocationContext {
    /// Create a new invocation context
    #[must_use]
    pub fn new(exchange: Exchange, config: BreakerConfig, chain: Arc<dyn PluginChain>) -> Self {
        Self {
            exchange,
            config,
            chain,
        }
    }
}
