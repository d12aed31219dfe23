//! Rate limiting configuration for the forecast endpoint.

use std::env;

/// Requests allowed per client IP within one period
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub period_seconds: u64,
    /// Key clients on `X-Forwarded-For` and friends instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            period_seconds: 180,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_requests = env::var("RATE_LIMIT_REQUESTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_requests);

        let period_seconds = env::var("RATE_LIMIT_PERIOD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.period_seconds);

        let trust_proxy_headers = env::var("RATE_LIMIT_TRUST_PROXY_HEADERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.trust_proxy_headers);

        Self {
            max_requests,
            period_seconds,
            trust_proxy_headers,
        }
    }
}
