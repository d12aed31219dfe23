//! Process-wide forecast cache with per-entry expiry.
//!
//! Backed by a bounded `moka` cache. Every entry carries its own time-to-live,
//! measured from the moment it was written. Values are `Arc<Forecast>`; an
//! entry is only ever replaced, never mutated.

use crate::models::Forecast;
use moka::{Expiry, future::Cache};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

/// Default lifetime of a cached forecast
pub const DEFAULT_FORECAST_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
struct CacheEntry {
    forecast: Arc<Forecast>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    // Overwrites restart the clock
    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Shared key/value store for normalized forecasts.
///
/// Cloning is cheap and clones share the same underlying storage.
#[derive(Clone)]
pub struct ForecastCache {
    inner: Cache<String, CacheEntry>,
}

impl ForecastCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { inner }
    }

    /// Fresh entry for `key`, if any
    pub async fn get(&self, key: &str) -> Option<Arc<Forecast>> {
        self.inner.get(key).await.map(|entry| entry.forecast)
    }

    /// Store `value` under `key`, replacing any previous entry
    pub async fn set(&self, key: impl Into<String>, value: Arc<Forecast>, ttl: Duration) {
        self.inner
            .insert(key.into(), CacheEntry { forecast: value, ttl })
            .await;
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of live entries
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    /// Return the entry for `key`, or run `init` and store its result.
    ///
    /// Concurrent callers that miss on the same key share a single `init`
    /// run. Errors are handed to every waiter and nothing is stored.
    pub async fn get_or_try_insert<F, E>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        init: F,
    ) -> Result<Arc<Forecast>, Arc<E>>
    where
        F: Future<Output = Result<Arc<Forecast>, E>>,
        E: Send + Sync + 'static,
    {
        let entry = self
            .inner
            .try_get_with(key.into(), async move {
                init.await.map(|forecast| CacheEntry { forecast, ttl })
            })
            .await?;

        Ok(entry.forecast)
    }
}

impl Default for ForecastCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn forecast(lat: f64) -> Arc<Forecast> {
        let serde_json::Value::Object(map) = json!({ "lat": lat }) else {
            panic!("fixture must be an object");
        };
        Arc::new(Forecast::from_payload(map, Utc::now()))
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = ForecastCache::default();
        assert!(cache.get("zipcode_75001").await.is_none());

        cache.set("zipcode_75001", forecast(33.44), DEFAULT_FORECAST_TTL).await;
        let cached = cache.get("zipcode_75001").await.unwrap();
        assert_eq!(cached.get("lat"), Some(&json!(33.44)));

        cache.delete("zipcode_75001").await;
        assert!(cache.get("zipcode_75001").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_every_entry() {
        let cache = ForecastCache::default();
        cache.set("zipcode_1", forecast(1.0), DEFAULT_FORECAST_TTL).await;
        cache.set("zipcode_2", forecast(2.0), DEFAULT_FORECAST_TTL).await;

        cache.clear();

        assert!(cache.get("zipcode_1").await.is_none());
        assert!(cache.get("zipcode_2").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = ForecastCache::default();
        cache
            .set("zipcode_75001", forecast(33.44), Duration::from_millis(50))
            .await;
        assert!(cache.get("zipcode_75001").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("zipcode_75001").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_init_is_not_cached() {
        let cache = ForecastCache::default();

        let result = cache
            .get_or_try_insert("zipcode_75001", DEFAULT_FORECAST_TTL, async {
                Err::<Arc<Forecast>, _>("upstream down")
            })
            .await;

        assert_eq!(*result.unwrap_err(), "upstream down");
        assert!(cache.get("zipcode_75001").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_init() {
        let cache = ForecastCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_try_insert("zipcode_75001", DEFAULT_FORECAST_TTL, async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, String>(forecast(33.44))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
