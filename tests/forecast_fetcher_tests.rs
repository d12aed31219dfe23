//! Integration tests for the cached forecast fetcher
//!
//! OpenWeather is stubbed with wiremock; `.expect(n)` asserts how many
//! upstream calls each scenario makes.

use forecastly::{
    CachedForecastFetcher, Coordinates, FetchError, Field, ForecastCache, ForecastRequest,
    OpenWeatherConfig, RequestLocation, ResilientClient, ResilientClientConfig,
    services::{RetryConfig, forecast::cache_key_for},
};
use serde_json::{Value, json};
use std::{
    io,
    net::TcpListener,
    sync::{Arc, Mutex},
    time::Duration,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

const API_KEY: &str = "test-api-key";
const ONECALL_PATH: &str = "/data/3.0/onecall";

fn test_client() -> ResilientClient {
    let config = ResilientClientConfig {
        timeout_ms: 1_000,
        connect_timeout_ms: 500,
        retry: RetryConfig {
            max_retries: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    ResilientClient::new(config, None).expect("Failed to create client")
}

fn fetcher_for(server: &MockServer) -> CachedForecastFetcher {
    CachedForecastFetcher::new(
        OpenWeatherConfig::new(API_KEY, server.uri()),
        test_client(),
        ForecastCache::new(100),
    )
}

fn request() -> ForecastRequest {
    ForecastRequest::new(33.44, -94.04, 75001)
}

fn sample_payload() -> Value {
    json!({
        "lat": 33.44,
        "lon": -94.04,
        "timezone": "America/Chicago",
        "timezoneOffset": -18000,
        "current": {
            "dt": 1684929490,
            "temp": 72.5,
            "feelsLike": 70.1,
            "windSpeed": 5.2,
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}]
        },
        "hourly": [
            {"dt": 1684926000, "temp": 71.0, "windGust": 9.1},
            {"dt": 1684929600, "temp": 72.0, "windGust": 8.4}
        ],
        "daily": [
            {"dt": 1684951200, "temp": {"min": 60.0, "max": 80.0}, "moonPhase": 0.16}
        ]
    })
}

async fn mount_forecast(server: &MockServer, body: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .and(query_param("lat", "33.44"))
        .and(query_param("lon", "-94.04"))
        .and(query_param("units", "imperial"))
        .and(query_param("exclude", "minutely,alerts"))
        .and(query_param("appid", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_no_calls(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_missing_fields_fail_without_network_access() {
    let server = MockServer::start().await;
    mount_no_calls(&server).await;
    let fetcher = fetcher_for(&server);

    let err = fetcher.fetch(&ForecastRequest::default()).await.unwrap_err();

    let errors = err.validation_errors().expect("expected validation failure");
    assert_eq!(
        errors.missing_fields(),
        vec![Field::Latitude, Field::Longitude, Field::LocationKey]
    );
    assert_eq!(
        err.user_messages(),
        vec![
            "Latitude is required".to_string(),
            "Longitude is required".to_string(),
            "Zip code is required".to_string(),
        ]
    );
    assert_eq!(fetcher.cache().entry_count().await, 0);
}

#[tokio::test]
async fn test_missing_credentials_fail_validation() {
    let server = MockServer::start().await;
    mount_no_calls(&server).await;
    let config = OpenWeatherConfig {
        api_key: None,
        endpoint: None,
        ..Default::default()
    };
    let fetcher = CachedForecastFetcher::new(config, test_client(), ForecastCache::new(100));

    let err = fetcher.fetch(&request()).await.unwrap_err();

    let errors = err.validation_errors().expect("expected validation failure");
    assert_eq!(errors.missing_fields(), vec![Field::ApiKey, Field::ApiEndpoint]);
}

#[tokio::test]
async fn test_malformed_latitude_is_reported_alone() {
    let server = MockServer::start().await;
    mount_no_calls(&server).await;
    let fetcher = fetcher_for(&server);

    let err = fetcher
        .fetch(&ForecastRequest::new("abc", -94.04, 75001))
        .await
        .unwrap_err();

    let errors = err.validation_errors().expect("expected validation failure");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.invalid_fields(), vec![Field::Latitude]);
    assert!(errors.missing_fields().is_empty());
}

#[tokio::test]
async fn test_out_of_range_coordinates_are_invalid() {
    let server = MockServer::start().await;
    mount_no_calls(&server).await;
    let fetcher = fetcher_for(&server);

    let err = fetcher
        .fetch(&ForecastRequest::new(91, 181, 75001))
        .await
        .unwrap_err();

    let errors = err.validation_errors().expect("expected validation failure");
    assert_eq!(errors.invalid_fields(), vec![Field::Latitude, Field::Longitude]);
}

#[tokio::test]
async fn test_successful_fetch_normalizes_and_caches() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 1).await;
    let fetcher = fetcher_for(&server);

    let forecast = fetcher.fetch(&request()).await.expect("fetch should succeed");

    assert_eq!(forecast.get("timezone_offset"), Some(&json!(-18000)));
    assert!(forecast.get("timezoneOffset").is_none());

    let current = forecast.current().expect("current section");
    assert_eq!(current["feels_like"], json!(70.1));
    assert_eq!(current["wind_speed"], json!(5.2));
    assert_eq!(current["weather"][0]["main"], json!("Clear"));

    assert_eq!(forecast.hourly().len(), 2);
    assert_eq!(forecast.hourly()[0]["wind_gust"], json!(9.1));
    assert_eq!(forecast.daily()[0]["moon_phase"], json!(0.16));
    assert_eq!(forecast.daily()[0]["temp"]["max"], json!(80.0));

    let cached = fetcher
        .cache()
        .get(&cache_key_for(75001))
        .await
        .expect("forecast should be cached");
    assert!(Arc::ptr_eq(&cached, &forecast));
}

#[tokio::test]
async fn test_second_fetch_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 1).await;
    let fetcher = fetcher_for(&server);

    let first = fetcher.fetch(&request()).await.unwrap();
    let second = fetcher.fetch(&request()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.fetched_at(), second.fetched_at());
}

#[tokio::test]
async fn test_cache_key_ignores_coordinates() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 1).await;
    let fetcher = fetcher_for(&server);

    let first = fetcher.fetch(&request()).await.unwrap();
    // Same zip with different coordinates reuses the cached entry
    let second = fetcher
        .fetch(&ForecastRequest::new(40.71, -74.0, 75001))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_upstream_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server);

    for _ in 0..2 {
        let err = fetcher.fetch(&request()).await.unwrap_err();
        assert!(err.is_upstream_unavailable());
        assert_eq!(err.to_string(), "Unable to retrieve weather information.");
        assert_eq!(
            err.user_messages(),
            vec!["Unable to retrieve weather information.".to_string()]
        );
    }

    assert!(fetcher.cache().get(&cache_key_for(75001)).await.is_none());
}

#[tokio::test]
async fn test_non_retryable_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401, "message": "Invalid API key"})))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server);

    let err = fetcher.fetch(&request()).await.unwrap_err();

    assert!(matches!(err, FetchError::UpstreamUnavailable(_)));
    assert_eq!(fetcher.cache().entry_count().await, 0);
}

#[tokio::test]
async fn test_empty_and_non_object_bodies_are_unavailable() {
    for body in [json!({}), json!(null), json!([1, 2, 3]), json!("sunny")] {
        let server = MockServer::start().await;
        mount_forecast(&server, body.clone(), 1).await;
        let fetcher = fetcher_for(&server);

        let err = fetcher.fetch(&request()).await.unwrap_err();

        assert!(err.is_upstream_unavailable(), "body {body} should be rejected");
        assert_eq!(fetcher.cache().entry_count().await, 0);
    }
}

#[tokio::test]
async fn test_invalid_json_body_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server);

    let err = fetcher.fetch(&request()).await.unwrap_err();
    assert!(err.is_upstream_unavailable());
}

#[tokio::test]
async fn test_deleting_entry_forces_refetch() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 1).await;
    let fetcher = fetcher_for(&server);

    let first = fetcher.fetch(&request()).await.unwrap();
    fetcher.cache().delete(&cache_key_for(75001)).await;

    server.reset().await;
    let mut updated = sample_payload();
    updated["current"]["temp"] = json!(90.0);
    mount_forecast(&server, updated, 1).await;

    let second = fetcher.fetch(&request()).await.unwrap();

    assert_eq!(first.current().unwrap()["temp"], json!(72.5));
    assert_eq!(second.current().unwrap()["temp"], json!(90.0));
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 2).await;
    let fetcher = CachedForecastFetcher::new(
        OpenWeatherConfig::new(API_KEY, server.uri()).with_cache_ttl(Duration::from_millis(50)),
        test_client(),
        ForecastCache::new(100),
    );

    fetcher.fetch(&request()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    fetcher.fetch(&request()).await.unwrap();
}

#[tokio::test]
async fn test_all_top_level_sections_pass_through() {
    let server = MockServer::start().await;
    let mut body = sample_payload();
    body["alerts"] = json!([{"senderName": "NWS Tulsa", "event": "Heat Advisory"}]);
    mount_forecast(&server, body, 1).await;
    let fetcher = fetcher_for(&server);

    let forecast = fetcher.fetch(&request()).await.unwrap();

    let mut keys: Vec<&str> = forecast.keys().collect();
    keys.sort_unstable();
    for section in ["alerts", "current", "daily", "hourly"] {
        assert!(keys.contains(&section), "missing section {section}");
    }
    assert_eq!(forecast.alerts()[0]["sender_name"], json!("NWS Tulsa"));
}

#[tokio::test]
async fn test_concurrent_misses_share_one_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_payload())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = Arc::new(fetcher_for(&server));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch(&request()).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("fetch should succeed"));
    }

    assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn test_fetch_for_request_location() {
    let server = MockServer::start().await;
    mount_forecast(&server, sample_payload(), 1).await;
    let fetcher = fetcher_for(&server);

    let location = RequestLocation {
        timezone: Some("America/Chicago".to_string()),
        ..RequestLocation::new(Coordinates { lat: 33.44, lon: -94.04 }, 75001)
    };

    let forecast = fetcher.fetch_for(&location).await.unwrap();
    assert_eq!(forecast.get("timezone"), Some(&json!("America/Chicago")));

    let err = fetcher.fetch_for(&RequestLocation::default()).await.unwrap_err();
    assert!(err.validation_errors().is_some());
}

#[tokio::test]
async fn test_caller_credentials_take_precedence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .and(query_param("appid", "caller-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server);

    let request = ForecastRequest {
        api_key: Some("caller-key".to_string()),
        ..request()
    };

    assert!(fetcher.fetch(&request).await.is_ok());
}

#[tokio::test]
async fn test_slow_upstream_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONECALL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_payload())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(
        ResilientClientConfig {
            timeout_ms: 100,
            retry: RetryConfig {
                max_retries: 0,
                ..Default::default()
            },
            ..Default::default()
        },
        None,
    )
    .expect("Failed to create client");
    let fetcher = CachedForecastFetcher::new(
        OpenWeatherConfig::new(API_KEY, server.uri()),
        client,
        ForecastCache::new(100),
    );

    let err = fetcher.fetch(&request()).await.unwrap_err();

    assert!(err.is_upstream_unavailable());
    assert_eq!(err.to_string(), "Unable to retrieve weather information.");
    assert!(fetcher.cache().get(&cache_key_for(75001)).await.is_none());
}

/// Formatted log output shared with the subscriber under test
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failure_logs_never_contain_api_key() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    // Nothing listens on a port once its listener is dropped
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let secret = "s3cr3t-onecall-key";
    let client = ResilientClient::new(
        ResilientClientConfig {
            timeout_ms: 1_000,
            connect_timeout_ms: 500,
            retry: RetryConfig {
                max_retries: 1,
                initial_delay_ms: 10,
                max_delay_ms: 20,
                ..Default::default()
            },
            ..Default::default()
        },
        None,
    )
    .expect("Failed to create client");
    let fetcher = CachedForecastFetcher::new(
        OpenWeatherConfig::new(secret, format!("http://127.0.0.1:{port}")),
        client,
        ForecastCache::new(10),
    );

    let err = fetcher.fetch(&request()).await.unwrap_err();
    assert!(err.is_upstream_unavailable());

    let output = logs.contents();
    assert!(output.contains("Upstream request failed with network error"));
    assert!(output.contains("Unable to retrieve weather information"));
    assert!(output.contains("appid=[REDACTED]"));
    assert!(!output.contains(secret), "API key leaked into logs:\n{output}");
}
