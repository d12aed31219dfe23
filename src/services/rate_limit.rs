//! Per-client rate limiting for the forecast endpoint.

use crate::{
    config::RateLimitConfig,
    models::ErrorResponse,
    utils::http::{forwarded_ip, peer_ip},
};
use actix_web::{HttpRequest, HttpResponse};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::warn;

/// Fixed-window in-memory rate limiter keyed by client IP
#[derive(Clone)]
pub struct SimpleRateLimiter {
    config: RateLimitConfig,
    storage: Arc<Mutex<HashMap<String, (usize, Instant)>>>,
}

impl SimpleRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            storage: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Key a request is counted under.
    ///
    /// Proxy headers are only consulted when configured as trusted.
    pub fn client_key(&self, req: &HttpRequest) -> String {
        self.config
            .trust_proxy_headers
            .then(|| forwarded_ip(req))
            .flatten()
            .unwrap_or_else(|| peer_ip(req))
    }

    /// Count a request against `key`.
    ///
    /// Returns `true` if the request should be allowed, `false` if rate limited.
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let period = Duration::from_secs(self.config.period_seconds);
        let now = Instant::now();
        // A panic while holding the lock leaves only counters behind
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);

        storage.retain(|_, (_, window_start)| now.duration_since(*window_start) < period);

        match storage.get_mut(key) {
            Some((count, _)) if *count >= self.config.max_requests => false,
            Some((count, _)) => {
                *count += 1;
                true
            }
            None if self.config.max_requests == 0 => false,
            None => {
                storage.insert(key.to_string(), (1, now));
                true
            }
        }
    }
}

/// Reject the request with 429 when its client IP is over the limit
pub fn rate_limit_middleware(
    req: &HttpRequest,
    limiter: &SimpleRateLimiter,
) -> Result<(), HttpResponse> {
    let ip = limiter.client_key(req);

    if !limiter.check_rate_limit(&ip) {
        warn!(client_ip = %ip, path = req.path(), "Rate limit exceeded");
        return Err(HttpResponse::TooManyRequests().json(ErrorResponse::with_message(
            "rate_limited",
            "Rate limit exceeded. Please try again later.",
        )));
    }

    Ok(())
}
