//! Forecast endpoint handler.

use crate::{
    models::{ErrorResponse, ForecastQuery, ForecastRequest, ForecastResponse},
    services::{
        forecast::{CachedForecastFetcher, FetchError},
        rate_limit::{SimpleRateLimiter, rate_limit_middleware},
    },
};
use actix_web::{Error, HttpRequest, HttpResponse, Result, web};
use paperclip::actix::api_v2_operation;

/// Forecast endpoint
///
/// Returns the normalized OpenWeather forecast for a coordinate pair. The zip
/// code identifies the cached entry, so repeated requests for one zip within
/// the cache TTL are served without contacting OpenWeather.
#[api_v2_operation(
    summary = "Weather Forecast Endpoint",
    description = "Returns the current, hourly and daily forecast for the given coordinates (e.g., ?lat=33.44&lon=-94.04&zip=75001). All keys are snake_case. Forecasts are cached per zip code.",
    tags("Forecast"),
    responses(
        (status = 200, description = "Successful response"),
        (status = 422, description = "Unprocessable Entity - Missing or malformed location parameters"),
        (status = 429, description = "Too Many Requests"),
        (status = 503, description = "Service Unavailable - Unable to retrieve weather information")
    )
)]
pub async fn forecast(
    req: HttpRequest,
    query: web::Query<ForecastQuery>,
) -> Result<HttpResponse, Error> {
    if let Some(limiter) = req.app_data::<web::Data<SimpleRateLimiter>>() {
        if let Err(response) = rate_limit_middleware(&req, limiter) {
            return Ok(response);
        }
    }

    let fetcher = req
        .app_data::<web::Data<CachedForecastFetcher>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Forecast service not configured"))?;

    let ForecastQuery { lat, lon, zip } = query.into_inner();
    let request = ForecastRequest {
        latitude: lat,
        longitude: lon,
        location_key: zip,
        ..Default::default()
    };

    let result = match fetcher.validate(&request) {
        Ok(validated) => fetcher
            .fetch_validated(&validated)
            .await
            .map(|forecast| (validated.location_key(), forecast)),
        Err(err) => Err(err),
    };

    let response = match result {
        Ok((zip, forecast)) => HttpResponse::Ok().json(ForecastResponse {
            zip: zip.to_string(),
            fetched_at: forecast.fetched_at(),
            forecast,
        }),
        Err(FetchError::Validation(errors)) => {
            HttpResponse::UnprocessableEntity().json(ErrorResponse::validation(&errors))
        }
        Err(err @ FetchError::UpstreamUnavailable(_)) => HttpResponse::ServiceUnavailable()
            .json(ErrorResponse::with_message("upstream_unavailable", err.to_string())),
    };

    Ok(response)
}
