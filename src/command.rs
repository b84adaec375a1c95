//! Command execution
//!
//! The execution unit wrapping every downstream call: isolation limit,
//! breaker admission, deadline race, outcome recording, fallback. One
//! invocation produces exactly one [`Outcome`], whatever the downstream
//! does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::Result;
use crate::downstream::Downstream;
use crate::exchange::{BackendResponse, InvocationContext};
use crate::failsafe::{
    Admission, BreakerKey, BreakerMetrics, BreakerRegistry, FailureKind, IsolationLimiter,
};
use crate::fallback::FallbackResolver;

/// Why an invocation fell back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// Isolation limit exceeded
    Rejected,
    /// Circuit open, sleep window not elapsed
    OpenBreaker,
    /// Deadline elapsed before the call completed
    Timeout,
    /// Downstream call completed with a failure
    DownstreamError,
}

impl FallbackReason {
    /// Stable wire name of the reason
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::OpenBreaker => "circuit-open",
            Self::Timeout => "timeout",
            Self::DownstreamError => "downstream-error",
        }
    }

    /// HTTP status for the locally built fallback response
    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            Self::Rejected | Self::OpenBreaker => 503,
            Self::Timeout => 504,
            Self::DownstreamError => 502,
        }
    }

    /// Human-readable description
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Rejected => "Concurrency limit reached, request rejected",
            Self::OpenBreaker => "Circuit breaker is open, failing fast",
            Self::Timeout => "Downstream call timed out",
            Self::DownstreamError => "Downstream call failed",
        }
    }
}

/// Result of one invocation
#[derive(Debug)]
pub enum Outcome {
    /// Downstream call succeeded; the plugin chain has been resumed
    Success(BackendResponse),
    /// Primary path did not complete; the caller ships this response and
    /// must not resume the chain
    Fallback {
        /// Why the fallback fired
        reason: FallbackReason,
        /// The degraded response
        response: BackendResponse,
    },
}

impl Outcome {
    /// The response carried by either variant
    #[must_use]
    pub fn response(&self) -> &BackendResponse {
        match self {
            Self::Success(response) | Self::Fallback { response, .. } => response,
        }
    }

    /// Whether this outcome is a success
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Status snapshot for one route: breaker metrics plus in-flight count
#[derive(Debug, Clone, Serialize)]
pub struct RouteStatus {
    /// Breaker snapshot
    #[serde(flatten)]
    pub breaker: BreakerMetrics,
    /// Executions currently in flight
    pub in_flight: u32,
}

/// Circuit-breaker-protected command executor
///
/// Long-lived; owns the breaker registry and isolation limiter shared by
/// every route, a fallback resolver, and the downstream client.
pub struct CommandExecutor {
    /// Per-route breaker state
    registry: BreakerRegistry,
    /// Per-route concurrency limiter
    limiter: IsolationLimiter,
    /// Fallback resolver
    fallback: FallbackResolver,
    /// Downstream client
    downstream: Arc<dyn Downstream>,
}

impl CommandExecutor {
    /// Create an executor over a downstream client
    pub fn new(downstream: Arc<dyn Downstream>) -> Result<Self> {
        Ok(Self {
            registry: BreakerRegistry::new(),
            limiter: IsolationLimiter::new(),
            fallback: FallbackResolver::new()?,
            downstream,
        })
    }

    /// Execute one invocation
    ///
    /// On `Success` the continuation has already been invoked with the
    /// downstream response. On `Fallback` the continuation was never
    /// invoked and the caller ships the fallback response.
    #[tracing::instrument(
        skip(self, ctx),
        fields(
            group = %ctx.config.group_key,
            command = %ctx.config.command_key,
            request_id = %uuid::Uuid::new_v4()
        )
    )]
    pub async fn execute(&self, ctx: InvocationContext) -> Outcome {
        let key = BreakerKey::from_config(&ctx.config);

        // Isolation first: a saturated route rejects before the breaker is
        // consulted, and the rejection leaves the window untouched.
        let Some(_permit) = self
            .limiter
            .try_acquire(&key, ctx.config.max_concurrent_requests)
        else {
            warn!("Isolation limit reached, rejecting");
            return self.fall_back(&ctx, FallbackReason::Rejected).await;
        };

        let breaker = self.registry.get_or_create(&ctx.config);
        let admission = breaker.try_admit();
        if admission == Admission::Rejected {
            return self.fall_back(&ctx, FallbackReason::OpenBreaker).await;
        }
        let probe = admission == Admission::Probe;

        let started = Instant::now();
        let result = tokio::time::timeout(ctx.config.timeout, self.downstream.call(&ctx.exchange)).await;
        let latency = started.elapsed();

        // The permit is dropped when this frame unwinds; every arm below,
        // including the timeout arm that cancelled the call, releases it.
        match result {
            Ok(Ok(response)) => {
                breaker.on_success(probe);
                info!(latency_ms = latency.as_millis() as u64, status = response.status, "Downstream call succeeded");
                if let Err(e) = ctx.chain.proceed(&ctx.exchange, &response).await {
                    warn!(error = %e, "Plugin chain failed after successful downstream call");
                }
                Outcome::Success(response)
            }
            Ok(Err(e)) => {
                breaker.on_failure(FailureKind::Downstream, probe);
                warn!(error = %e, latency_ms = latency.as_millis() as u64, "Downstream call failed");
                self.fall_back(&ctx, FallbackReason::DownstreamError).await
            }
            Err(_) => {
                breaker.on_failure(FailureKind::Timeout, probe);
                warn!(timeout_ms = ctx.config.timeout.as_millis() as u64, "Downstream call timed out");
                self.fall_back(&ctx, FallbackReason::Timeout).await
            }
        }
    }

    async fn fall_back(&self, ctx: &InvocationContext, reason: FallbackReason) -> Outcome {
        let response = self.fallback.resolve(ctx, reason).await;
        Outcome::Fallback { reason, response }
    }

    /// Breaker registry (read access for status surfaces)
    #[must_use]
    pub fn registry(&self) -> &BreakerRegistry {
        &self.registry
    }

    /// Status snapshots for every route seen so far
    #[must_use]
    pub fn statuses(&self) -> HashMap<String, RouteStatus> {
        self.registry
            .statuses()
            .into_iter()
            .map(|(name, breaker)| {
                let key = BreakerKey::new(breaker.group.clone(), breaker.command.clone());
                let in_flight = self.limiter.in_flight(&key);
                (
                    name,
                    RouteStatus {
                        breaker,
                        in_flight,
                    },
                )
            })
            .collect()
    }
}
