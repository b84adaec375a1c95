//! Circuit breaker implementation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::registry::BreakerKey;
use super::window::{RollingWindow, WindowTotals};
use crate::config::BreakerConfig;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Circuit is closed (allowing requests)
    Closed,
    /// Circuit is open (rejecting requests)
    Open,
    /// Circuit is half-open (allowing a single probe)
    HalfOpen,
}

/// Admission decision for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Call passes through normally
    Allowed,
    /// Call is the single half-open probe
    Probe,
    /// Call must fall back without touching the downstream
    Rejected,
}

/// How an executed call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call completed with a downstream error
    Downstream,
    /// The deadline elapsed before the call completed
    Timeout,
}

/// Per-route circuit breaker state
///
/// One instance exists per `(group_key, command_key)` for the registry's
/// lifetime. Thresholds and the window size are captured from the config
/// seen at creation; later configs for the same key do not resize them.
pub struct BreakerState {
    /// Breaker identity
    key: BreakerKey,
    /// Error percentage at which the breaker opens
    error_threshold_percentage: u64,
    /// Minimum window volume before the breaker may open
    request_volume_threshold: u64,
    /// How long the breaker stays open before admitting a probe
    sleep_window: Duration,
    /// State
    state: RwLock<CircuitState>,
    /// Rolling outcome window
    window: Mutex<RollingWindow>,
    /// Last state change, millis on the breaker clock
    last_transition_ms: AtomicU64,
    /// Single-slot gate for the half-open probe
    probe_in_flight: AtomicBool,
    /// Reference instant for the breaker clock
    epoch: Instant,
}

impl BreakerState {
    /// Create breaker state sized from `config`
    #[must_use]
    pub fn new(key: BreakerKey, config: &BreakerConfig) -> Self {
        Self {
            key,
            error_threshold_percentage: u64::from(config.error_threshold_percentage),
            request_volume_threshold: config.request_volume_threshold,
            sleep_window: config.sleep_window,
            state: RwLock::new(CircuitState::Closed),
            window: Mutex::new(RollingWindow::new(
                config.rolling_window,
                config.rolling_buckets,
            )),
            last_transition_ms: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
            epoch: Instant::now(),
        }
    }

    /// Decide whether a call may proceed
    ///
    /// Open circuits admit nothing until the sleep window elapses; the
    /// first caller at or after that point transitions the breaker to
    /// half-open and becomes the probe. During half-open every other
    /// caller is rejected.
    pub fn try_admit(&self) -> Admission {
        let state = *self.state.read();

        match state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                if self.since_transition() < self.sleep_window {
                    return Admission::Rejected;
                }
                // Claim the transition and the probe slot atomically.
                let mut state = self.state.write();
                if *state == CircuitState::Open && self.since_transition() >= self.sleep_window {
                    *state = CircuitState::HalfOpen;
                    self.touch_transition();
                    self.probe_in_flight.store(true, Ordering::Release);
                    drop(state);
                    debug!(route = %self.key, "Sleep window elapsed, half-open probe admitted");
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    // The slot freed between our state read and the claim;
                    // only valid while still half-open.
                    if *self.state.read() == CircuitState::HalfOpen {
                        debug!(route = %self.key, "Half-open probe slot claimed");
                        Admission::Probe
                    } else {
                        self.probe_in_flight.store(false, Ordering::Release);
                        Admission::Rejected
                    }
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful call
    pub fn on_success(&self, probe: bool) {
        let now = self.now_ms();
        self.window.lock().record_success(now);

        if probe {
            self.transition_to(CircuitState::Closed);
            self.probe_in_flight.store(false, Ordering::Release);
        }
    }

    /// Record a failed call and evaluate the trip threshold
    pub fn on_failure(&self, kind: FailureKind, probe: bool) {
        let now = self.now_ms();
        let totals = {
            let mut window = self.window.lock();
            match kind {
                FailureKind::Downstream => window.record_failure(now),
                FailureKind::Timeout => window.record_timeout(now),
            }
            window.totals(now)
        };

        if probe {
            warn!(route = %self.key, ?kind, "Probe failed, reopening circuit");
            self.transition_to(CircuitState::Open);
            self.probe_in_flight.store(false, Ordering::Release);
            return;
        }

        if *self.state.read() == CircuitState::Closed
            && totals.total() >= self.request_volume_threshold
            && totals.error_percentage() >= self.error_threshold_percentage
        {
            warn!(
                route = %self.key,
                total = totals.total(),
                error_percentage = totals.error_percentage(),
                "Error threshold crossed"
            );
            self.transition_to(CircuitState::Open);
        }
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    /// Snapshot of the breaker for status surfaces
    pub fn metrics(&self) -> BreakerMetrics {
        let totals = self.window.lock().totals(self.now_ms());
        BreakerMetrics {
            group: self.key.group().to_string(),
            command: self.key.command().to_string(),
            state: self.state(),
            success: totals.success,
            failure: totals.failure,
            timeout: totals.timeout,
            error_percentage: totals.error_percentage(),
            since_transition_ms: self.since_transition().as_millis() as u64,
        }
    }

    /// Human-readable status line for logs and admin surfaces
    pub fn status_message(&self) -> String {
        let totals = self.window.lock().totals(self.now_ms());
        match self.state() {
            CircuitState::Closed => {
                format!("Route '{}': circuit closed ({} calls in window)", self.key, totals.total())
            }
            CircuitState::Open => {
                let remaining = self.sleep_window.saturating_sub(self.since_transition());
                format!(
                    "Route '{}': circuit breaker is open ({} errors of {} calls); retry in {} seconds",
                    self.key,
                    totals.errors(),
                    totals.total(),
                    remaining.as_secs()
                )
            }
            CircuitState::HalfOpen => {
                format!("Route '{}': circuit half-open, testing recovery", self.key)
            }
        }
    }

    /// Window totals at this instant
    pub fn window_totals(&self) -> WindowTotals {
        self.window.lock().totals(self.now_ms())
    }

    /// Transition to a new state
    fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write();
        let old_state = *state;

        if old_state == new_state {
            return;
        }

        *state = new_state;
        self.touch_transition();
        drop(state);

        match new_state {
            CircuitState::Closed => {
                self.window.lock().reset(self.now_ms());
                info!(route = %self.key, "Circuit breaker closed");
            }
            CircuitState::Open => {
                warn!(route = %self.key, "Circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                debug!(route = %self.key, "Circuit breaker half-open");
            }
        }
    }

    fn touch_transition(&self) {
        self.last_transition_ms.store(self.now_ms(), Ordering::Release);
    }

    fn since_transition(&self) -> Duration {
        let last = self.last_transition_ms.load(Ordering::Acquire);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Snapshot of one breaker's state and window
#[derive(Debug, Clone, Serialize)]
pub struct BreakerMetrics {
    /// Breaker group key
    pub group: String,
    /// Breaker command key
    pub command: String,
    /// Current circuit state
    pub state: CircuitState,
    /// Successes in the rolling window
    pub success: u64,
    /// Failures in the rolling window
    pub failure: u64,
    /// Timeouts in the rolling window
    pub timeout: u64,
    /// Error percentage over the window
    pub error_percentage: u64,
    /// Milliseconds since the last state transition
    pub since_transition_ms: u64,
}
