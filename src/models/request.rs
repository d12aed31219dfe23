//! Forecast request input and validation.
//!
//! A [`ForecastRequest`] carries raw, possibly malformed caller input. The only
//! way to obtain a [`ValidatedForecastRequest`] is [`ForecastRequest::validate`],
//! which checks every field before any cache or network access happens.

use std::fmt;

/// Raw forecast request as received from a caller.
///
/// Coordinates and zip code come from the request location; the API key and
/// endpoint are attached from process configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastRequest {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub location_key: Option<String>,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
}

impl ForecastRequest {
    pub fn new(
        latitude: impl ToString,
        longitude: impl ToString,
        location_key: impl ToString,
    ) -> Self {
        Self {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            location_key: Some(location_key.to_string()),
            api_key: None,
            api_endpoint: None,
        }
    }

    /// Fill absent credentials from configuration. Values already set win.
    pub fn with_default_credentials(
        mut self,
        api_key: Option<&str>,
        api_endpoint: Option<&str>,
    ) -> Self {
        if self.api_key.is_none() {
            self.api_key = api_key.map(str::to_string);
        }
        if self.api_endpoint.is_none() {
            self.api_endpoint = api_endpoint.map(str::to_string);
        }
        self
    }

    /// Validate every field, collecting one error per offending field.
    pub fn validate(&self) -> Result<ValidatedForecastRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let latitude = parse_coordinate(&mut errors, Field::Latitude, self.latitude.as_deref(), 90.0);
        let longitude =
            parse_coordinate(&mut errors, Field::Longitude, self.longitude.as_deref(), 180.0);

        let location_key = match present(self.location_key.as_deref()) {
            None => {
                errors.push(Field::LocationKey, FieldErrorKind::MissingField);
                None
            }
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    errors.push(Field::LocationKey, FieldErrorKind::InvalidFormat("is not a valid integer"));
                    None
                }
            },
        };

        let api_key = present(self.api_key.as_deref()).map(str::to_string);
        if api_key.is_none() {
            errors.push(Field::ApiKey, FieldErrorKind::MissingField);
        }

        let api_endpoint = present(self.api_endpoint.as_deref()).map(|e| e.trim_end_matches('/').to_string());
        if api_endpoint.is_none() {
            errors.push(Field::ApiEndpoint, FieldErrorKind::MissingField);
        }

        match (latitude, longitude, location_key, api_key, api_endpoint) {
            (Some(latitude), Some(longitude), Some(location_key), Some(api_key), Some(api_endpoint))
                if errors.is_empty() =>
            {
                Ok(ValidatedForecastRequest {
                    latitude,
                    longitude,
                    location_key,
                    api_key,
                    api_endpoint,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Blank input counts as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_coordinate(
    errors: &mut ValidationErrors,
    field: Field,
    raw: Option<&str>,
    bound: f64,
) -> Option<f64> {
    let Some(raw) = present(raw) else {
        errors.push(field, FieldErrorKind::MissingField);
        return None;
    };

    // f64 parsing accepts "NaN" and "inf", which are not decimals
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if (-bound..=bound).contains(&value) {
                Some(value)
            } else {
                errors.push(field, FieldErrorKind::OutOfRange(bound));
                None
            }
        }
        _ => {
            errors.push(field, FieldErrorKind::InvalidFormat("is not a valid decimal"));
            None
        }
    }
}

/// A forecast request whose fields have all been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedForecastRequest {
    latitude: f64,
    longitude: f64,
    location_key: i64,
    api_key: String,
    api_endpoint: String,
}

impl ValidatedForecastRequest {
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn location_key(&self) -> i64 {
        self.location_key
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Endpoint base URL without a trailing slash
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }
}

/// Request fields subject to validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Latitude,
    Longitude,
    LocationKey,
    ApiKey,
    ApiEndpoint,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Latitude => "lat",
            Field::Longitude => "lon",
            Field::LocationKey => "zip",
            Field::ApiKey => "api_key",
            Field::ApiEndpoint => "endpoint",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::LocationKey => "Zip code",
            Field::ApiKey => "API key",
            Field::ApiEndpoint => "API endpoint",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldErrorKind {
    MissingField,
    InvalidFormat(&'static str),
    /// Parsed, but outside `[-bound, bound]`. Reported as a format failure.
    OutOfRange(f64),
}

impl FieldErrorKind {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldErrorKind::MissingField)
    }

    pub fn is_invalid_format(&self) -> bool {
        matches!(self, FieldErrorKind::InvalidFormat(_) | FieldErrorKind::OutOfRange(_))
    }
}

/// A single field failure
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: Field,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.field.label();
        match &self.kind {
            FieldErrorKind::MissingField => write!(f, "{label} is required"),
            FieldErrorKind::InvalidFormat(reason) => write!(f, "{label} {reason}"),
            FieldErrorKind::OutOfRange(bound) => {
                write!(f, "{label} must be between -{bound} and {bound}")
            }
        }
    }
}

/// All field failures found while validating one request
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{}", join_messages(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: Field, kind: FieldErrorKind) {
        self.errors.push(FieldError { field, kind });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Fields reported as absent
    pub fn missing_fields(&self) -> Vec<Field> {
        self.errors
            .iter()
            .filter(|e| e.kind.is_missing())
            .map(|e| e.field)
            .collect()
    }

    /// Fields present but malformed
    pub fn invalid_fields(&self) -> Vec<Field> {
        self.errors
            .iter()
            .filter(|e| e.kind.is_invalid_format())
            .map(|e| e.field)
            .collect()
    }

    /// Errors for one field, if any
    pub fn for_field(&self, field: Field) -> Vec<&FieldError> {
        self.errors.iter().filter(|e| e.field == field).collect()
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
