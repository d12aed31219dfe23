//! Resilient HTTP client for upstream calls.
//!
//! Wraps `reqwest` with:
//! - An explicit per-attempt timeout
//! - Bounded retries with jittered exponential backoff on retryable statuses
//! - A circuit breaker per destination host
//! - Structured logging and optional Prometheus metrics
//!
//! The client is shared through `&self`; circuit breaker state lives behind a
//! mutex so one instance can serve every request in the process.

use crate::utils::redact::redact_secrets;
use prometheus::{CounterVec, GaugeVec, HistogramVec, Opts, Registry};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};
use tokio_retry::{Retry, strategy::ExponentialBackoff};
use tracing::{error, info, warn};

/// Configuration for the resilient HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilientClientConfig {
    /// Timeout for a single attempt, including reading the response head (ms)
    pub timeout_ms: u64,

    /// Connection timeout (ms)
    pub connect_timeout_ms: u64,

    pub retry: RetryConfig,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Log every attempt, not only failures after retries
    pub enable_detailed_logging: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying
    pub max_retries: usize,

    /// Delay before the first retry; later retries double it (ms)
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay (ms)
    pub max_delay_ms: u64,

    /// Retry on these HTTP status codes
    pub retry_on_status: Vec<u16>,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,

    /// Successes in half-open state that close the circuit
    pub success_threshold: usize,

    /// Time the circuit stays open before a trial request (seconds)
    pub timeout_seconds: u64,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            connect_timeout_ms: 3_000,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            enable_detailed_logging: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_seconds: 60,
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreakerState {
    fn gauge_value(&self) -> f64 {
        match self {
            CircuitBreakerState::Closed => 0.0,
            CircuitBreakerState::Open => 1.0,
            CircuitBreakerState::HalfOpen => 2.0,
        }
    }
}

/// Consecutive-failure circuit breaker
#[derive(Debug)]
pub struct SimpleCircuitBreaker {
    state: CircuitBreakerState,
    failure_count: usize,
    success_count: usize,
    config: CircuitBreakerConfig,
    last_failure_time: Option<Instant>,
}

impl SimpleCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            config,
            last_failure_time: None,
        }
    }

    pub fn call_allowed(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let cooled_down = self.last_failure_time.is_some_and(|last| {
                    last.elapsed() >= Duration::from_secs(self.config.timeout_seconds)
                });
                if cooled_down {
                    self.state = CircuitBreakerState::HalfOpen;
                    self.success_count = 0;
                }
                cooled_down
            }
        }
    }

    pub fn on_success(&mut self) {
        self.failure_count = 0;

        if self.state == CircuitBreakerState::HalfOpen {
            self.success_count += 1;
            if self.success_count >= self.config.success_threshold {
                self.state = CircuitBreakerState::Closed;
            }
        }
    }

    pub fn on_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        // A failed trial request reopens immediately
        if self.state == CircuitBreakerState::HalfOpen
            || self.failure_count >= self.config.failure_threshold
        {
            self.state = CircuitBreakerState::Open;
        }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }
}

/// Metrics for upstream HTTP calls
#[derive(Clone)]
pub struct ResilientClientMetrics {
    /// Requests by destination and outcome
    pub http_requests_total: CounterVec,

    /// Request duration by destination, retries included
    pub http_request_duration_seconds: HistogramVec,

    /// Exhausted retry sequences by destination and reason
    pub retry_attempts_total: CounterVec,

    /// Circuit breaker state by destination (0=closed, 1=open, 2=half-open)
    pub circuit_breaker_state: GaugeVec,

    pub timeouts_total: CounterVec,
}

impl ResilientClientMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let http_requests_total = CounterVec::new(
            Opts::new(
                "upstream_http_requests_total",
                "Total upstream HTTP requests by destination and outcome",
            ),
            &["destination", "outcome"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "upstream_http_request_duration_seconds",
                "Duration of upstream HTTP requests including retries",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["destination"],
        )?;

        let retry_attempts_total = CounterVec::new(
            Opts::new(
                "upstream_http_retry_attempts_total",
                "Upstream requests that exhausted retries, by destination and reason",
            ),
            &["destination", "reason"],
        )?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "upstream_http_circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            &["destination"],
        )?;

        let timeouts_total = CounterVec::new(
            Opts::new("upstream_http_timeouts_total", "Upstream request timeouts by destination"),
            &["destination"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(retry_attempts_total.clone()))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            retry_attempts_total,
            circuit_breaker_state,
            timeouts_total,
        })
    }
}

/// Per-call context for logging and metrics
#[derive(Debug, Clone)]
struct RequestContext {
    destination: String,
    /// URL with credentials redacted, safe to log
    url: String,
    start_time: Instant,
}

/// HTTP client with timeouts, retries, and circuit breakers
pub struct ResilientClient {
    client: Client,
    config: ResilientClientConfig,
    metrics: Option<ResilientClientMetrics>,
    circuit_breakers: Mutex<HashMap<String, SimpleCircuitBreaker>>,
}

impl ResilientClient {
    pub fn new(
        config: ResilientClientConfig,
        metrics: Option<ResilientClientMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            metrics,
            circuit_breakers: Mutex::new(HashMap::new()),
        })
    }

    /// Current breaker state for a destination host, if it has been called
    pub fn circuit_state(&self, destination: &str) -> Option<CircuitBreakerState> {
        self.with_breakers(|breakers| breakers.get(destination).map(|cb| cb.state().clone()))
    }

    /// Execute a GET request with retries, timeout, and circuit breaking.
    ///
    /// Non-retryable, non-success statuses are returned as `Ok`; the caller
    /// decides what they mean.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ResilientClientError> {
        let context = RequestContext {
            destination: extract_destination(url),
            url: redact_secrets(url),
            start_time: Instant::now(),
        };

        let (allowed, state) = self.with_breakers(|breakers| {
            let breaker = breakers
                .entry(context.destination.clone())
                .or_insert_with(|| SimpleCircuitBreaker::new(self.config.circuit_breaker.clone()));
            (breaker.call_allowed(), breaker.state().gauge_value())
        });
        self.record_circuit_breaker_state(&context.destination, state);

        if !allowed {
            warn!(
                destination = %context.destination,
                url = %context.url,
                "Circuit breaker is open, rejecting request"
            );
            self.record_request_metrics(&context, "circuit_open");
            return Err(ResilientClientError::CircuitBreakerOpen);
        }

        let result = self.execute_with_retry(url, &context).await;

        let state = self.with_breakers(|breakers| {
            breakers.get_mut(&context.destination).map(|cb| {
                match &result {
                    Ok(_) => cb.on_success(),
                    Err(_) => cb.on_failure(),
                }
                cb.state().gauge_value()
            })
        });
        if let Some(state) = state {
            self.record_circuit_breaker_state(&context.destination, state);
        }

        match &result {
            Ok(_) => self.record_request_metrics(&context, "success"),
            Err(ResilientClientError::RetryableStatus(_)) => {
                self.record_request_metrics(&context, "retry_exhausted");
                self.record_retry_attempt(&context, "http_status");
            }
            Err(ResilientClientError::NetworkError(_)) => {
                self.record_request_metrics(&context, "network_error");
                self.record_retry_attempt(&context, "network_error");
            }
            Err(ResilientClientError::Timeout) => {
                self.record_request_metrics(&context, "timeout");
                self.record_timeout(&context);
            }
            Err(ResilientClientError::CircuitBreakerOpen) => {
                self.record_request_metrics(&context, "circuit_open");
            }
        }

        result
    }

    async fn execute_with_retry(
        &self,
        url: &str,
        context: &RequestContext,
    ) -> Result<reqwest::Response, ResilientClientError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);

        // from_millis(2) with factor d/2 yields d, 2d, 4d, ...
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor((self.config.retry.initial_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(self.config.retry.max_delay_ms))
            .map(tokio_retry::strategy::jitter)
            .take(self.config.retry.max_retries);

        let config = &self.config;
        let client = &self.client;

        Retry::spawn(retry_strategy, || async move {
            let start = Instant::now();
            let result = tokio::time::timeout(timeout, client.get(url).send()).await;

            match result {
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    let duration_ms = start.elapsed().as_millis();

                    if is_retry_status(status, &config.retry.retry_on_status) {
                        warn!(
                            destination = %context.destination,
                            url = %context.url,
                            status,
                            duration_ms,
                            "Upstream request failed with retryable status"
                        );
                        Err(ResilientClientError::RetryableStatus(status))
                    } else {
                        if config.enable_detailed_logging {
                            info!(
                                destination = %context.destination,
                                url = %context.url,
                                status,
                                duration_ms,
                                "Upstream request completed"
                            );
                        }
                        Ok(response)
                    }
                }
                Ok(Err(e)) => {
                    error!(
                        destination = %context.destination,
                        url = %context.url,
                        error = %redact_secrets(&e.to_string()),
                        duration_ms = start.elapsed().as_millis(),
                        "Upstream request failed with network error"
                    );
                    Err(ResilientClientError::NetworkError(e.without_url()))
                }
                Err(_) => {
                    warn!(
                        destination = %context.destination,
                        url = %context.url,
                        timeout_ms = timeout.as_millis(),
                        "Upstream request timed out"
                    );
                    Err(ResilientClientError::Timeout)
                }
            }
        })
        .await
    }

    fn with_breakers<R>(&self, f: impl FnOnce(&mut HashMap<String, SimpleCircuitBreaker>) -> R) -> R {
        // A poisoned lock only means another request panicked mid-update;
        // breaker counters remain usable.
        let mut breakers = self
            .circuit_breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut breakers)
    }

    fn record_request_metrics(&self, context: &RequestContext, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .http_requests_total
                .with_label_values(&[context.destination.as_str(), outcome])
                .inc();

            metrics
                .http_request_duration_seconds
                .with_label_values(&[context.destination.as_str()])
                .observe(context.start_time.elapsed().as_secs_f64());
        }
    }

    fn record_retry_attempt(&self, context: &RequestContext, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .retry_attempts_total
                .with_label_values(&[context.destination.as_str(), reason])
                .inc();
        }
    }

    fn record_timeout(&self, context: &RequestContext) {
        if let Some(metrics) = &self.metrics {
            metrics
                .timeouts_total
                .with_label_values(&[context.destination.as_str()])
                .inc();
        }
    }

    fn record_circuit_breaker_state(&self, destination: &str, state: f64) {
        if let Some(metrics) = &self.metrics {
            metrics
                .circuit_breaker_state
                .with_label_values(&[destination])
                .set(state);
        }
    }
}

/// Host part of a URL, used to group breakers and metrics
fn extract_destination(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "invalid_url".to_string())
}

fn is_retry_status(status: u16, retry_statuses: &[u16]) -> bool {
    retry_statuses.contains(&status)
}

/// Errors that can occur with the resilient client
#[derive(Debug, thiserror::Error)]
pub enum ResilientClientError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Circuit breaker is open")]
    CircuitBreakerOpen,

    #[error("Retryable status code: {0}")]
    RetryableStatus(u16),
}
