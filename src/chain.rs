//! Plugin chain continuation
//!
//! The executor sits in the middle of a gateway plugin pipeline. When a
//! downstream call succeeds, the remainder of the pipeline is resumed
//! through this trait; on any fallback outcome the chain is never invoked
//! and the caller ships the fallback response instead.

use async_trait::async_trait;

use crate::Result;
use crate::exchange::{BackendResponse, Exchange};

/// Continuation for the remainder of the gateway pipeline
#[async_trait]
pub trait PluginChain: Send + Sync {
    /// Resume the pipeline with the downstream response
    ///
    /// Invoked at most once per invocation, only after a successful
    /// downstream call. A chain error does not change the recorded breaker
    /// outcome; the downstream call already succeeded.
    async fn proceed(&self, exchange: &Exchange, response: &BackendResponse) -> Result<()>;
}

/// Chain that does nothing, for pipelines terminating at the executor
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChain;

#[async_trait]
impl PluginChain for NoopChain {
    async fn proceed(&self, _exchange: &Exchange, _response: &BackendResponse) -> Result<()> {
        Ok(())
    }
}
