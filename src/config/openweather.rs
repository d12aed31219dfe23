//! OpenWeather and forecast cache configuration.

use crate::services::cache::DEFAULT_FORECAST_TTL;
use std::{env, fmt, time::Duration};

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org";
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Upstream credentials and cache policy
///
/// Either credential may be absent; every fetch then fails validation.
#[derive(Clone)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,
    /// API base URL, without the `/data/3.0/onecall` path
    pub endpoint: Option<String>,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            cache_ttl: DEFAULT_FORECAST_TTL,
            cache_max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
        }
    }
}

impl OpenWeatherConfig {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Load configuration from environment variables, falling back to defaults
    ///
    /// An empty `OPENWEATHER_ENDPOINT` disables the endpoint rather than
    /// falling back to the default.
    pub fn from_env() -> Self {
        let api_key = env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let endpoint = match env::var("OPENWEATHER_ENDPOINT") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(DEFAULT_ENDPOINT.to_string()),
        };

        let cache_ttl = env::var("FORECAST_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FORECAST_TTL);

        let cache_max_capacity = env::var("FORECAST_CACHE_MAX_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_MAX_CAPACITY);

        Self {
            api_key,
            endpoint,
            cache_ttl,
            cache_max_capacity,
        }
    }
}

// The API key never appears in debug output
impl fmt::Debug for OpenWeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_max_capacity", &self.cache_max_capacity)
            .finish()
    }
}
