//! Cached forecast fetching.
//!
//! [`CachedForecastFetcher`] validates a [`ForecastRequest`], serves a fresh
//! cached forecast when one exists, and otherwise calls the OpenWeather One
//! Call API. Successful responses are normalized and cached; failures are
//! never cached and surface as a single user-facing error.

use crate::{
    config::OpenWeatherConfig,
    models::{Forecast, ForecastRequest, RequestLocation, ValidatedForecastRequest, ValidationErrors},
    services::{
        cache::ForecastCache,
        metrics::ForecastMetrics,
        resilient_client::{ResilientClient, ResilientClientError},
    },
    utils::redact::redact_secrets,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use url::Url;

const ONECALL_PATH: &str = "/data/3.0/onecall";
const UNITS: &str = "imperial";
const EXCLUDED_SECTIONS: &str = "minutely,alerts";

/// User-facing text for every upstream failure
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str = "Unable to retrieve weather information.";

/// Cache key for a location identifier. Coordinates are deliberately not part
/// of the key.
pub fn cache_key_for(location_key: i64) -> String {
    format!("zipcode_{location_key}")
}

/// Forecast fetcher shared by every request in the process
pub struct CachedForecastFetcher {
    client: ResilientClient,
    cache: ForecastCache,
    config: OpenWeatherConfig,
    metrics: Option<ForecastMetrics>,
}

impl CachedForecastFetcher {
    pub fn new(config: OpenWeatherConfig, client: ResilientClient, cache: ForecastCache) -> Self {
        Self {
            client,
            cache,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ForecastMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &ForecastCache {
        &self.cache
    }

    pub fn config(&self) -> &OpenWeatherConfig {
        &self.config
    }

    /// Fetch the forecast for a request location context
    pub async fn fetch_for(&self, location: &RequestLocation) -> Result<Arc<Forecast>, FetchError> {
        self.fetch(&location.forecast_request()).await
    }

    /// Validate, then serve from cache or fetch from upstream.
    ///
    /// Validation failures return before any cache or network access.
    pub async fn fetch(&self, request: &ForecastRequest) -> Result<Arc<Forecast>, FetchError> {
        let validated = self.validate(request)?;
        self.fetch_validated(&validated).await
    }

    /// Check `request`, taking missing credentials from configuration.
    pub fn validate(&self, request: &ForecastRequest) -> Result<ValidatedForecastRequest, FetchError> {
        request
            .clone()
            .with_default_credentials(self.config.api_key.as_deref(), self.config.endpoint.as_deref())
            .validate()
            .map_err(|errors| {
                debug!(errors = %errors, "Forecast request failed validation");
                FetchError::Validation(errors)
            })
    }

    /// Serve an already validated request from cache or upstream
    #[instrument(skip(self, validated), fields(zip = validated.location_key()))]
    pub async fn fetch_validated(
        &self,
        validated: &ValidatedForecastRequest,
    ) -> Result<Arc<Forecast>, FetchError> {
        let key = cache_key_for(validated.location_key());

        if let Some(forecast) = self.cache.get(&key).await {
            debug!(cache_key = %key, "Serving forecast from cache");
            self.record_cache_lookup(true);
            return Ok(forecast);
        }
        self.record_cache_lookup(false);

        self.cache
            .get_or_try_insert(key.as_str(), self.config.cache_ttl, self.fetch_upstream(validated))
            .await
            .map_err(|cause| {
                error!(
                    cache_key = %key,
                    error = %redact_secrets(&cause.to_string()),
                    "Unable to retrieve weather information"
                );
                FetchError::UpstreamUnavailable(cause)
            })
    }

    async fn fetch_upstream(
        &self,
        request: &ValidatedForecastRequest,
    ) -> Result<Arc<Forecast>, UpstreamError> {
        let result = self.request_forecast(request).await;
        self.record_upstream_fetch(result.is_ok());

        if result.is_ok() {
            info!(
                zip = request.location_key(),
                lat = request.latitude(),
                lon = request.longitude(),
                "Fetched forecast from upstream"
            );
        }
        result
    }

    async fn request_forecast(
        &self,
        request: &ValidatedForecastRequest,
    ) -> Result<Arc<Forecast>, UpstreamError> {
        let url = onecall_url(request)?;
        let response = self.client.get(url.as_str()).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Body(e.without_url()))?;
        let forecast = parse_forecast(&body)?;

        Ok(Arc::new(forecast))
    }

    fn record_cache_lookup(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(hit);
        }
    }

    fn record_upstream_fetch(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upstream_fetch(success);
        }
    }
}

fn onecall_url(request: &ValidatedForecastRequest) -> Result<Url, UpstreamError> {
    let base = format!("{}{}", request.api_endpoint(), ONECALL_PATH);
    let url = Url::parse_with_params(
        &base,
        &[
            ("lat", request.latitude().to_string().as_str()),
            ("lon", request.longitude().to_string().as_str()),
            ("units", UNITS),
            ("exclude", EXCLUDED_SECTIONS),
            ("appid", request.api_key()),
        ],
    )?;
    Ok(url)
}

/// Decode an upstream body into a forecast. Blank bodies, `null` and `{}`
/// all count as "no data".
fn parse_forecast(body: &[u8]) -> Result<Forecast, UpstreamError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(UpstreamError::Empty);
    }

    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) if map.is_empty() => Err(UpstreamError::Empty),
        Value::Object(map) => Ok(Forecast::from_payload(map, Utc::now())),
        Value::Null => Err(UpstreamError::Empty),
        _ => Err(UpstreamError::NotAnObject),
    }
}

/// Why an upstream fetch produced no forecast. Logged, never shown to users.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("upstream request failed: {0}")]
    Transport(#[from] ResilientClientError),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("upstream body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("upstream body is not a JSON object")]
    NotAnObject,

    #[error("upstream returned no forecast data")]
    Empty,
}

/// Errors returned by [`CachedForecastFetcher::fetch`]
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// One or more fields missing or malformed; no I/O was attempted
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Upstream failed or returned nothing; the cause is for diagnostics only
    #[error("Unable to retrieve weather information.")]
    UpstreamUnavailable(#[source] Arc<UpstreamError>),
}

impl FetchError {
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            FetchError::Validation(errors) => Some(errors),
            FetchError::UpstreamUnavailable(_) => None,
        }
    }

    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, FetchError::UpstreamUnavailable(_))
    }

    /// Messages safe to show an end user
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            FetchError::Validation(errors) => errors.full_messages(),
            FetchError::UpstreamUnavailable(_) => vec![UPSTREAM_UNAVAILABLE_MESSAGE.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validated() -> ValidatedForecastRequest {
        ForecastRequest::new(33.44, -94.04, 75001)
            .with_default_credentials(Some("test-key"), Some("https://api.openweathermap.org"))
            .validate()
            .unwrap()
    }

    #[test]
    fn test_cache_key_uses_location_key_only() {
        assert_eq!(cache_key_for(75001), "zipcode_75001");
    }

    #[test]
    fn test_onecall_url() {
        let url = onecall_url(&validated()).unwrap();

        assert_eq!(url.path(), "/data/3.0/onecall");
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            params,
            vec![
                ("lat".to_string(), "33.44".to_string()),
                ("lon".to_string(), "-94.04".to_string()),
                ("units".to_string(), "imperial".to_string()),
                ("exclude".to_string(), "minutely,alerts".to_string()),
                ("appid".to_string(), "test-key".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_forecast_normalizes_keys() {
        let forecast = parse_forecast(br#"{"lat": 33.44, "current": {"feelsLike": 70.1}}"#).unwrap();
        assert_eq!(forecast.current().unwrap()["feels_like"], 70.1);
    }

    #[test]
    fn test_parse_forecast_rejects_no_data() {
        assert!(matches!(parse_forecast(b""), Err(UpstreamError::Empty)));
        assert!(matches!(parse_forecast(b"  \n"), Err(UpstreamError::Empty)));
        assert!(matches!(parse_forecast(b"{}"), Err(UpstreamError::Empty)));
        assert!(matches!(parse_forecast(b"null"), Err(UpstreamError::Empty)));
        assert!(matches!(parse_forecast(b"[1, 2]"), Err(UpstreamError::NotAnObject)));
        assert!(matches!(parse_forecast(b"<html>"), Err(UpstreamError::Parse(_))));
    }

    #[test]
    fn test_upstream_error_message_is_fixed() {
        let err = FetchError::UpstreamUnavailable(Arc::new(UpstreamError::Status(500)));

        assert_eq!(err.to_string(), UPSTREAM_UNAVAILABLE_MESSAGE);
        assert_eq!(err.user_messages(), vec![UPSTREAM_UNAVAILABLE_MESSAGE.to_string()]);
        assert!(err.is_upstream_unavailable());
        assert!(err.validation_errors().is_none());
    }
}
