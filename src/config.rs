//! Configuration management

use std::{collections::HashMap, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Per-route breaker configurations, keyed by route name
    pub routes: HashMap<String, BreakerConfig>,
    /// Downstream HTTP client configuration
    pub downstream: DownstreamConfig,
}

/// Downstream HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Connect timeout for downstream sockets
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum idle pooled connections per host
    pub pool_max_idle_per_host: usize,
    /// Idle timeout before a pooled connection is dropped
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Per-route circuit breaker configuration
///
/// `group_key` + `command_key` together identify the breaker. Two routes
/// sharing both keys share breaker state; the window is sized by whichever
/// config the registry saw first for that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker group key (typically the backend service name)
    pub group_key: String,
    /// Breaker command key (typically the route name)
    pub command_key: String,
    /// Deadline for the downstream call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Maximum concurrent in-flight requests for the route
    pub max_concurrent_requests: u32,
    /// Error percentage at which the breaker opens
    pub error_threshold_percentage: u32,
    /// Minimum request volume in the window before the breaker may open
    pub request_volume_threshold: u64,
    /// How long the breaker stays open before allowing a probe
    #[serde(with = "humantime_serde")]
    pub sleep_window: Duration,
    /// Span of the rolling error window
    #[serde(with = "humantime_serde")]
    pub rolling_window: Duration,
    /// Number of buckets the rolling window is divided into
    pub rolling_buckets: usize,
    /// Optional URI to fetch the fallback response from
    #[serde(default)]
    pub fallback_uri: Option<Url>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            group_key: String::new(),
            command_key: String::new(),
            timeout: Duration::from_secs(3),
            max_concurrent_requests: 100,
            error_threshold_percentage: 50,
            request_volume_threshold: 20,
            sleep_window: Duration::from_secs(5),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            fallback_uri: None,
        }
    }
}

impl BreakerConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a field is outside its valid range.
    /// Validation failures are fatal at load time; the executor assumes a
    /// validated config.
    pub fn validate(&self) -> Result<()> {
        if self.group_key.is_empty() || self.command_key.is_empty() {
            return Err(Error::Config(
                "group_key and command_key must be non-empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config(format!(
                "timeout must be positive for {}:{}",
                self.group_key, self.command_key
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::Config(format!(
                "max_concurrent_requests must be positive for {}:{}",
                self.group_key, self.command_key
            )));
        }
        if self.error_threshold_percentage > 100 {
            return Err(Error::Config(format!(
                "error_threshold_percentage must be within 0..=100 for {}:{}",
                self.group_key, self.command_key
            )));
        }
        if self.rolling_buckets == 0 || self.rolling_window.is_zero() {
            return Err(Error::Config(format!(
                "rolling window must have a positive span and bucket count for {}:{}",
                self.group_key, self.command_key
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be
    /// parsed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (FUSEGATE_ prefix)
        figment = figment.merge(Env::prefixed("FUSEGATE_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate every route's breaker configuration
    pub fn validate(&self) -> Result<()> {
        for breaker in self.routes.values() {
            breaker.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_handle_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.max_concurrent_requests, 100);
        assert_eq!(config.error_threshold_percentage, 50);
        assert_eq!(config.request_volume_threshold, 20);
        assert_eq!(config.sleep_window, Duration::from_secs(5));
        assert!(config.fallback_uri.is_none());
    }

    #[test]
    fn validation_rejects_zero_timeout() {
        let config = BreakerConfig {
            group_key: "orders".to_string(),
            command_key: "list".to_string(),
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_keys() {
        let config = BreakerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_threshold_over_100() {
        let config = BreakerConfig {
            group_key: "orders".to_string(),
            command_key: "list".to_string(),
            error_threshold_percentage: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
routes:
  orders:
    group_key: orders-service
    command_key: orders-list
    timeout: 1s
    max_concurrent_requests: 10
    error_threshold_percentage: 50
    request_volume_threshold: 5
    sleep_window: 2s
    fallback_uri: "http://callback:8093/test"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        let orders = &config.routes["orders"];
        assert_eq!(orders.group_key, "orders-service");
        assert_eq!(orders.timeout, Duration::from_secs(1));
        assert_eq!(orders.max_concurrent_requests, 10);
        assert_eq!(orders.request_volume_threshold, 5);
        assert_eq!(orders.sleep_window, Duration::from_secs(2));
        assert_eq!(
            orders.fallback_uri.as_ref().unwrap().host_str(),
            Some("callback")
        );
    }

    #[test]
    fn load_missing_file_is_fatal() {
        let err = Config::load(Some(Path::new("/nonexistent/fusegate.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
