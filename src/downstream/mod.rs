//! Downstream client implementations

mod http;

pub use self::http::HttpDownstream;

use async_trait::async_trait;

use crate::Result;
use crate::exchange::{BackendResponse, Exchange};

/// Client for the downstream backend behind a route
///
/// The executor issues exactly one `call` per admitted invocation. The
/// deadline is enforced by the executor, not the implementation; a call
/// may be cancelled mid-flight when the deadline elapses.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Perform the downstream call for the exchange
    async fn call(&self, exchange: &Exchange) -> Result<BackendResponse>;
}
