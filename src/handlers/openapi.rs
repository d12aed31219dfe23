//! OpenAPI specification generation and app factory.

use crate::{
    config::{MetricsConfig, OpenWeatherConfig, RateLimitConfig},
    handlers::{forecast, get_metrics, health, version},
    middleware::{MetricsMiddleware, RequestIdMiddleware},
    services::{
        AppMetrics, CachedForecastFetcher, ForecastCache, ForecastMetrics, ResilientClient,
        ResilientClientConfig, ResilientClientMetrics, SimpleRateLimiter,
    },
};
use actix_web::App;
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};

/// Creates the shared OpenAPI specification for the API
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "Forecastly API".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Weather forecasts backed by the OpenWeather One Call API.\n\n\
                ## Forecasts\n\
                `GET /api/forecast?lat=33.44&lon=-94.04&zip=75001` returns the current, hourly and \
                daily forecast in imperial units. Every key in the forecast is snake_case.\n\
                \n\
                **Caching:** forecasts are cached per zip code for `FORECAST_CACHE_TTL_SECONDS` \
                (default 1800). Coordinates are not part of the cache key.\n\
                \n\
                **Errors:**\n\
                - `422` with `{\"error\": \"validation_failed\", \"messages\": [...], \"fields\": [...]}` \
                when a parameter is missing or malformed\n\
                - `503` with `{\"error\": \"upstream_unavailable\", \"message\": \"Unable to retrieve weather information.\"}` \
                when OpenWeather fails or returns no data\n\
                - `429` when the per-client rate limit is exceeded"
                    .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Errors raised while assembling the application state
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// State shared by every worker.
///
/// Built once and cloned into each worker's `App` so the forecast cache, rate
/// limiter counters and metrics registry are process-wide.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: web::Data<CachedForecastFetcher>,
    pub metrics: web::Data<AppMetrics>,
    pub metrics_config: web::Data<MetricsConfig>,
    pub limiter: web::Data<SimpleRateLimiter>,
}

impl AppState {
    /// Wire a fetcher into fresh metrics and a rate limiter
    pub fn new(
        fetcher: CachedForecastFetcher,
        metrics: AppMetrics,
        rate_limit: RateLimitConfig,
        metrics_config: MetricsConfig,
    ) -> Result<Self, StartupError> {
        let fetcher = fetcher.with_metrics(ForecastMetrics::new(&metrics.registry)?);

        Ok(Self {
            fetcher: web::Data::new(fetcher),
            metrics: web::Data::new(metrics),
            metrics_config: web::Data::new(metrics_config),
            limiter: web::Data::new(SimpleRateLimiter::new(rate_limit)),
        })
    }

    /// Build every component from environment configuration
    pub fn from_env() -> Result<Self, StartupError> {
        let metrics = AppMetrics::new()?;
        let client = ResilientClient::new(
            ResilientClientConfig::from_env(),
            Some(ResilientClientMetrics::new(&metrics.registry)?),
        )?;

        let config = OpenWeatherConfig::from_env();
        let cache = ForecastCache::new(config.cache_max_capacity);
        let fetcher = CachedForecastFetcher::new(config, client, cache);

        Self::new(
            fetcher,
            metrics,
            RateLimitConfig::from_env(),
            MetricsConfig::from_env(),
        )
    }
}

/// Creates the application for one worker from shared state
///
/// Used by the server and by tests, which build state around a stub upstream.
pub fn create_app(
    state: &AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    > + use<>,
> {
    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(state.fetcher.clone())
        .app_data(state.metrics.clone())
        .app_data(state.metrics_config.clone())
        .app_data(state.limiter.clone())
        .service(web::resource("/api/forecast").route(web::get().to(forecast)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
