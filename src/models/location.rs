//! Per-request location context.
//!
//! The location a forecast is requested for travels with the request as an
//! explicit value. Nothing here touches process-wide state such as the local
//! timezone; callers that care about the timezone read it off the value.

use crate::models::request::ForecastRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Where the current request wants a forecast for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestLocation {
    pub coordinates: Option<Coordinates>,
    pub zipcode: Option<i64>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    /// IANA timezone name, e.g. "America/Chicago"
    pub timezone: Option<String>,
}

impl RequestLocation {
    pub fn new(coordinates: Coordinates, zipcode: i64) -> Self {
        Self {
            coordinates: Some(coordinates),
            zipcode: Some(zipcode),
            ..Default::default()
        }
    }

    /// Forecast request for this location, without upstream credentials.
    pub fn forecast_request(&self) -> ForecastRequest {
        ForecastRequest {
            latitude: self.coordinates.map(|c| c.lat.to_string()),
            longitude: self.coordinates.map(|c| c.lon.to_string()),
            location_key: self.zipcode.map(|z| z.to_string()),
            api_key: None,
            api_endpoint: None,
        }
    }
}
