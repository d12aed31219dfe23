//! Forecastly - cached weather forecasts over HTTP
//!
//! A small Actix Web service in front of the OpenWeather One Call API:
//! - Input validation with per-field errors
//! - A process-wide forecast cache with per-entry TTL and coalesced misses
//! - Resilient upstream calls (timeouts, retries, circuit breaker)
//! - Prometheus metrics and structured request logging
//! - OpenAPI documentation
//!
//! ## Architecture
//!
//! - `models/` - Requests, forecasts, location context and API bodies
//! - `services/` - The cached fetcher, cache, HTTP client, rate limiter, metrics
//! - `handlers/` - HTTP request handlers and the app factory
//! - `middleware/` - Request ID and metrics middleware
//! - `utils/` - Request inspection and secret redaction
//! - `config/` - Configuration structures and environment loading
//!
//! ## Quick Start
//!
//! ```no_run
//! use forecastly::{AppState, ForecastRequest};
//!
//! #[actix_web::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::from_env()?;
//!     let request = ForecastRequest::new(33.44, -94.04, 75001);
//!     let forecast = state.fetcher.fetch(&request).await?;
//!     println!("{:?}", forecast.current());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{
    LogFormat, LoggingConfig, MetricsConfig, OpenWeatherConfig, RateLimitConfig, ServerConfig,
};
pub use handlers::{
    AppState, StartupError, create_app, create_openapi_spec, forecast, get_metrics, health,
    version,
};
pub use middleware::{MetricsMiddleware, RequestIdMiddleware};
pub use models::{
    Coordinates, ErrorResponse, Field, FieldError, FieldErrorKind, Forecast, ForecastQuery,
    ForecastRequest, ForecastResponse, HealthResponse, RequestLocation, ValidatedForecastRequest,
    ValidationErrors, VersionResponse,
};
pub use services::{
    AppMetrics, CachedForecastFetcher, FetchError, ForecastCache, ForecastMetrics,
    ResilientClient, ResilientClientConfig, ResilientClientError, ResilientClientMetrics,
    SimpleRateLimiter, UpstreamError, rate_limit_middleware,
};
pub use utils::{extract_client_ip, extract_route_pattern, extract_user_agent, redact_secrets};
