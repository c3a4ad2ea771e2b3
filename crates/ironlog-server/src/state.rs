// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared handler state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ironlog_core::error::CoreError;
use ironlog_core::persistence::{Persistence, PostgresPersistence, SqlitePersistence};

use crate::auth::IdentityVerifier;
use crate::cache::Cache;

/// Default lifetime of cached list responses (one hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// State shared by all handlers.
///
/// Every collaborator is injected, so tests can swap the store, cache and
/// token verifier independently.
#[derive(Clone)]
pub struct AppState {
    /// Store for users, exercises, routines and logs.
    pub persistence: Arc<dyn Persistence>,
    /// List response cache.
    pub cache: Arc<dyn Cache>,
    /// Identity token verifier.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Lifetime of cached list responses.
    pub cache_ttl: Duration,
    /// When the server started (for uptime calculation).
    pub start_time: Instant,
    /// Server version string.
    pub version: String,
}

impl AppState {
    /// Create handler state with the default cache lifetime.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        cache: Arc<dyn Cache>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            persistence,
            cache,
            verifier,
            cache_ttl: DEFAULT_CACHE_TTL,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the cache lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get uptime in milliseconds.
    pub fn uptime_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

/// Open the store named by `database_url` and run its migrations.
///
/// `sqlite:` URLs select the SQLite backend, anything else PostgreSQL.
pub async fn open_persistence(database_url: &str) -> Result<Arc<dyn Persistence>, CoreError> {
    if database_url.starts_with("sqlite:") {
        Ok(Arc::new(SqlitePersistence::connect(database_url).await?))
    } else {
        Ok(Arc::new(PostgresPersistence::connect(database_url).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtVerifier;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn test_open_sqlite_store() {
        let persistence = open_persistence("sqlite::memory:").await.unwrap();
        assert!(persistence.health_check_db().await.unwrap());
    }

    #[tokio::test]
    async fn test_state_defaults() {
        let state = AppState::new(
            open_persistence("sqlite::memory:").await.unwrap(),
            Arc::new(MemoryCache::new()),
            Arc::new(JwtVerifier::hs256(b"secret")),
        );

        assert_eq!(state.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
        assert!(state.uptime_ms() >= 0);

        let state = state.with_cache_ttl(Duration::from_secs(5));
        assert_eq!(state.cache_ttl, Duration::from_secs(5));
    }
}
