//! Per-route concurrency isolation
//!
//! Bounds in-flight executions per route. Acquisition is non-blocking:
//! when the route is saturated the call is rejected immediately, it never
//! queues. The permit is a guard; dropping it on any exit path (return,
//! error, timeout cancellation) releases the slot exactly once.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

use super::registry::BreakerKey;

struct RouteSlots {
    semaphore: Arc<Semaphore>,
    /// Capacity captured when the route was first seen
    max: u32,
}

/// Per-route isolation limiter
pub struct IsolationLimiter {
    slots: DashMap<BreakerKey, RouteSlots>,
}

/// Held while one execution is in flight for a route
///
/// Releasing is the drop; there is no explicit release call.
pub struct IsolationPermit {
    _permit: OwnedSemaphorePermit,
}

impl IsolationLimiter {
    /// Create a new limiter
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Try to admit one execution for the route
    ///
    /// The semaphore is sized from `max_concurrent_requests` the first
    /// time the key is seen, mirroring the registry's
    /// capture-at-creation rule.
    #[must_use]
    pub fn try_acquire(&self, key: &BreakerKey, max_concurrent_requests: u32) -> Option<IsolationPermit> {
        let semaphore = {
            let entry = self.slots.entry(key.clone()).or_insert_with(|| RouteSlots {
                semaphore: Arc::new(Semaphore::new(max_concurrent_requests as usize)),
                max: max_concurrent_requests,
            });
            Arc::clone(&entry.semaphore)
        };

        match semaphore.try_acquire_owned() {
            Ok(permit) => Some(IsolationPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => {
                trace!(route = %key, "Isolation limit reached");
                None
            }
        }
    }

    /// Number of executions currently in flight for the route
    #[must_use]
    pub fn in_flight(&self, key: &BreakerKey) -> u32 {
        self.slots.get(key).map_or(0, |slots| {
            slots.max - slots.semaphore.available_permits() as u32
        })
    }
}

impl Default for IsolationLimiter {
    fn default() -> Self {
        Self::new()
    }
}
