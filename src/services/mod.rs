//! Forecast fetching and the services around it.
//!
//! [`forecast::CachedForecastFetcher`] is the core; the cache, resilient
//! HTTP client, rate limiter and metrics support it.

pub mod cache;
pub mod forecast;
pub mod metrics;
pub mod rate_limit;
pub mod resilient_client;

pub use cache::ForecastCache;
pub use forecast::{CachedForecastFetcher, FetchError, UpstreamError};
pub use metrics::*;
pub use rate_limit::*;
pub use resilient_client::{
    CircuitBreakerConfig, CircuitBreakerState, ResilientClient, ResilientClientConfig,
    ResilientClientError, ResilientClientMetrics, RetryConfig,
};
