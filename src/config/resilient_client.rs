//! Environment configuration for the upstream HTTP client

use crate::services::resilient_client::{CircuitBreakerConfig, ResilientClientConfig, RetryConfig};
use std::env;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ResilientClientConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            timeout_ms: env_or("FORECAST_HTTP_TIMEOUT_MS", defaults.timeout_ms),
            connect_timeout_ms: env_or("FORECAST_HTTP_CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms),
            retry: RetryConfig::from_env(),
            circuit_breaker: CircuitBreakerConfig::from_env(),
            enable_detailed_logging: env_or(
                "FORECAST_HTTP_DETAILED_LOGGING",
                defaults.enable_detailed_logging,
            ),
        }
    }
}

impl RetryConfig {
    /// Load retry configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Comma-separated status codes, e.g. "500,502,503"
        let retry_on_status = env::var("FORECAST_HTTP_RETRY_ON_STATUS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| s.trim().parse::<u16>().ok())
                    .collect()
            })
            .unwrap_or(defaults.retry_on_status);

        Self {
            max_retries: env_or("FORECAST_HTTP_RETRY_MAX_RETRIES", defaults.max_retries),
            initial_delay_ms: env_or("FORECAST_HTTP_RETRY_INITIAL_DELAY_MS", defaults.initial_delay_ms),
            max_delay_ms: env_or("FORECAST_HTTP_RETRY_MAX_DELAY_MS", defaults.max_delay_ms),
            retry_on_status,
        }
    }
}

impl CircuitBreakerConfig {
    /// Load circuit breaker configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            failure_threshold: env_or("FORECAST_HTTP_CB_FAILURE_THRESHOLD", defaults.failure_threshold),
            success_threshold: env_or("FORECAST_HTTP_CB_SUCCESS_THRESHOLD", defaults.success_threshold),
            timeout_seconds: env_or("FORECAST_HTTP_CB_TIMEOUT_SECONDS", defaults.timeout_seconds),
        }
    }
}
