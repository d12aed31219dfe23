//! API request and response models.

use crate::models::{forecast::Forecast, request::ValidationErrors};
use chrono::{DateTime, Utc};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response model for the health check endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response model for the version information endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

/// Query parameters for the forecast endpoint
///
/// Values are kept as text so malformed input reaches validation and is
/// reported per field instead of failing query extraction.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Apiv2Schema)]
pub struct ForecastQuery {
    /// Latitude coordinate (e.g., "33.44")
    pub lat: Option<String>,
    /// Longitude coordinate (e.g., "-94.04")
    pub lon: Option<String>,
    /// ZIP code used as the cache key (e.g., "75001")
    pub zip: Option<String>,
}

/// Successful forecast response
#[derive(Clone, Debug, Serialize)]
pub struct ForecastResponse {
    /// Zip code as used for the cache key
    pub zip: String,
    pub fetched_at: DateTime<Utc>,
    pub forecast: Arc<Forecast>,
}

/// Error body returned by the forecast endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorResponse {
    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
            messages: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Body for a request that failed validation, one message per field error
    pub fn validation(errors: &ValidationErrors) -> Self {
        let mut fields: Vec<String> = Vec::new();
        for error in errors.iter() {
            let name = error.field.name().to_string();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }

        Self {
            error: "validation_failed".to_string(),
            message: None,
            messages: errors.full_messages(),
            fields,
        }
    }
}
