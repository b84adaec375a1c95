//! HTTP downstream client
//!
//! Forwards the exchange snapshot to its target over plain HTTP. Method and
//! headers are carried verbatim; hop-by-hop concerns stay with the routing
//! layer.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use super::Downstream;
use crate::config::DownstreamConfig;
use crate::exchange::{BackendResponse, Exchange};
use crate::{Error, Result};

/// Reqwest-backed downstream client
pub struct HttpDownstream {
    /// HTTP client (pooled, shared across invocations)
    client: Client,
}

impl HttpDownstream {
    /// Create a new HTTP downstream client
    ///
    /// No overall request timeout is set on the client; the executor owns
    /// the per-route deadline.
    pub fn new(config: &DownstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create downstream client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn call(&self, exchange: &Exchange) -> Result<BackendResponse> {
        let method = Method::from_str(&exchange.method)
            .map_err(|_| Error::Downstream(format!("invalid method: {}", exchange.method)))?;

        let mut request = self.client.request(method, exchange.target.clone());

        for (name, value) in &exchange.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &exchange.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Downstream(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Downstream(e.to_string()))?;

        debug!(target = %exchange.target, status, "Downstream call completed");

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}
