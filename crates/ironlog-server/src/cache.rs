// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-through cache for list endpoints.
//!
//! List responses are stored as JSON strings under per-user keys and dropped
//! by every write that affects them. The cache is best effort: a failing
//! backend is logged and behaves like a miss.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache backend errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Redis command or connection failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove all `keys`. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}

// ============================================================================
// Keys
// ============================================================================

/// Cache key builders. Every key is scoped to one user.
pub mod keys {
    /// All exercises visible to the user.
    pub fn exercises(user: &str) -> String {
        format!("exercises:{}", user)
    }

    /// Exercises grouped by body part.
    pub fn exercises_grouped(user: &str) -> String {
        format!("exercises:{}:grouped", user)
    }

    /// The user's populated routines.
    pub fn routines(user: &str) -> String {
        format!("routines:{}", user)
    }

    /// One workout log listing; `filter` is `all`, `completed` or `pending`.
    pub fn logs(user: &str, filter: &str) -> String {
        format!("logs:{}:{}", user, filter)
    }

    /// Both exercise listings.
    pub fn all_exercises(user: &str) -> Vec<String> {
        vec![exercises(user), exercises_grouped(user)]
    }

    /// Every workout log listing.
    pub fn all_logs(user: &str) -> Vec<String> {
        ["all", "completed", "pending"]
            .iter()
            .map(|filter| logs(user, filter))
            .collect()
    }
}

// ============================================================================
// Read-through helpers
// ============================================================================

/// Where a list response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Served from the cache.
    Cache,
    /// Loaded from the store.
    Api,
}

/// Return the cached value for `key`, or run `load` and cache its result.
///
/// Errors from `load` are returned as is and nothing is cached.
pub async fn read_through<T, E, F, Fut>(
    cache: &dyn Cache,
    key: &str,
    ttl: Duration,
    load: F,
) -> Result<(T, Source), E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                return Ok((value, Source::Cache));
            }
            Err(e) => warn!(key, error = %e, "Discarding undecodable cache entry"),
        },
        Ok(None) => debug!(key, "Cache miss"),
        Err(e) => warn!(key, error = %e, "Cache read failed"),
    }

    let value = load().await?;

    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(e) = cache.set(key, &raw, ttl).await {
                warn!(key, error = %e, "Cache write failed");
            }
        }
        Err(e) => warn!(key, error = %e, "Failed to encode cache entry"),
    }

    Ok((value, Source::Api))
}

/// Drop `keys`, logging instead of failing.
pub async fn invalidate(cache: &dyn Cache, keys: &[String]) {
    if let Err(e) = cache.delete(keys).await {
        warn!(?keys, error = %e, "Cache invalidation failed");
    }
}

// ============================================================================
// Redis backend
// ============================================================================

/// Redis-backed cache using `SET EX`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to `url` with a reconnecting connection manager.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager_with_config(config).await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local cache, used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .and_then(|entry| (entry.1 > now).then(|| entry.0.clone()));

        if value.is_none() {
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache.set("routines:u-1", "[]", TTL).await.unwrap();

        assert_eq!(cache.get("routines:u-1").await.unwrap().as_deref(), Some("[]"));

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        assert!(cache.get("routines:u-1").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_delete_many() {
        let cache = MemoryCache::new();
        for key in keys::all_logs("u-1") {
            cache.set(&key, "[]", TTL).await.unwrap();
        }
        cache.set(&keys::routines("u-1"), "[]", TTL).await.unwrap();

        cache.delete(&keys::all_logs("u-1")).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&keys::routines("u-1")).await.unwrap().is_some());
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::exercises("u-1"), "exercises:u-1");
        assert_eq!(keys::exercises_grouped("u-1"), "exercises:u-1:grouped");
        assert_eq!(keys::routines("u-1"), "routines:u-1");
        assert_eq!(
            keys::all_logs("u-1"),
            vec!["logs:u-1:all", "logs:u-1:completed", "logs:u-1:pending"]
        );
    }

    #[tokio::test]
    async fn test_read_through_loads_once() {
        let cache = MemoryCache::new();
        let loads = AtomicUsize::new(0);

        for expected in [Source::Api, Source::Cache] {
            let (value, source) = read_through(&cache, "k", TTL, || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(vec![1, 2, 3])
            })
            .await
            .unwrap();

            assert_eq!(value, vec![1, 2, 3]);
            assert_eq!(source, expected);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_through_does_not_cache_errors() {
        let cache = MemoryCache::new();

        let result: Result<(Vec<i32>, Source), &str> =
            read_through(&cache, "k", TTL, || async { Err("store down") }).await;

        assert_eq!(result.unwrap_err(), "store down");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_read_through_replaces_corrupt_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "not json", TTL).await.unwrap();

        let (value, source) = read_through(&cache, "k", TTL, || async {
            Ok::<_, std::convert::Infallible>(vec!["fresh".to_string()])
        })
        .await
        .unwrap();

        assert_eq!(value, vec!["fresh".to_string()]);
        assert_eq!(source, Source::Api);
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some(r#"["fresh"]"#));
    }

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")).into())
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")).into())
        }

        async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")).into())
        }
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_to_store() {
        let (value, source) = read_through(&BrokenCache, "k", TTL, || async {
            Ok::<_, std::convert::Infallible>(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(source, Source::Api);

        invalidate(&BrokenCache, &keys::all_logs("u-1")).await;
    }
}
