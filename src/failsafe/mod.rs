//! Failsafe mechanisms: circuit breaker, rolling window, isolation, registry

mod circuit_breaker;
mod isolation;
mod registry;
mod window;

pub use circuit_breaker::{Admission, BreakerMetrics, BreakerState, CircuitState, FailureKind};
pub use isolation::{IsolationLimiter, IsolationPermit};
pub use registry::{BreakerKey, BreakerRegistry};
pub use window::{RollingWindow, WindowTotals};
