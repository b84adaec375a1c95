//! Fallback resolution
//!
//! Produces the degraded response shipped to the caller whenever the
//! primary path does not complete normally. With a configured fallback
//! URI the resolver fetches it once; any failure there degrades to the
//! locally built response. This path never errors and never re-enters
//! the executor.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::command::FallbackReason;
use crate::exchange::{BackendResponse, InvocationContext};
use crate::{Error, Result};

/// Header carrying the original failure reason on fallback responses
pub const FALLBACK_REASON_HEADER: &str = "x-fallback-reason";

/// Deadline for the fallback-URI fetch itself
const FALLBACK_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolver for degraded responses
pub struct FallbackResolver {
    /// Dedicated client for fallback-URI fetches
    client: Client,
}

impl FallbackResolver {
    /// Create a new resolver
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FALLBACK_FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create fallback client: {e}")))?;

        Ok(Self { client })
    }

    /// Produce the fallback response for an invocation
    pub async fn resolve(&self, ctx: &InvocationContext, reason: FallbackReason) -> BackendResponse {
        if let Some(uri) = &ctx.config.fallback_uri {
            match self.fetch(uri).await {
                Ok(mut response) => {
                    response
                        .headers
                        .insert(FALLBACK_REASON_HEADER.to_string(), reason.as_str().to_string());
                    debug!(uri = %uri, reason = reason.as_str(), "Fallback URI answered");
                    return response;
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "Fallback URI failed, degrading to local response");
                }
            }
        }

        Self::local(ctx, reason)
    }

    /// One GET against the fallback URI
    async fn fetch(&self, uri: &Url) -> Result<BackendResponse> {
        let response = self.client.get(uri.clone()).send().await?;

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
        let body = response.bytes().await?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }

    /// Locally built degraded response
    fn local(ctx: &InvocationContext, reason: FallbackReason) -> BackendResponse {
        let body = json!({
            "code": reason.status(),
            "reason": reason.as_str(),
            "message": reason.message(),
            "route": format!("{}:{}", ctx.config.group_key, ctx.config.command_key),
        });

        let mut response = BackendResponse::new(
            reason.status(),
            Bytes::from(body.to_string()),
        );
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
            .headers
            .insert(FALLBACK_REASON_HEADER.to_string(), reason.as_str().to_string());
        response
    }
}
