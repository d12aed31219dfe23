//! Route label extraction for metrics.

use actix_web::HttpRequest;

/// Metrics label for the request route.
///
/// Prefers the matched resource pattern so unknown paths share one label
/// instead of growing the label set without bound.
pub fn extract_route_pattern(req: &HttpRequest) -> String {
    match req.match_pattern() {
        Some(pattern) => pattern,
        None => "/unknown".to_string(),
    }
}
