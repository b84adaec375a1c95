//! Fusegate Library
//!
//! Per-route circuit breaker execution layer for API gateway pipelines.
//!
//! # Features
//!
//! - **Circuit Breaking**: per-route open/half-open/closed breaker over a
//!   rolling error window
//! - **Isolation**: bounded concurrency per route with immediate rejection
//! - **Deadlines**: every downstream call races a timeout
//! - **Fallbacks**: degraded local response or forward to a fallback URI
//! - **Pipeline Friendly**: single `execute` entry point resuming the plugin
//!   chain only on success

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod command;
pub mod config;
pub mod downstream;
pub mod error;
pub mod exchange;
pub mod failsafe;
pub mod fallback;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
