// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ironlog Server binary.
//!
//! Loads configuration from the environment, opens the store, picks the
//! cache backend and serves the REST API until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ironlog_server::auth::JwtVerifier;
use ironlog_server::cache::{Cache, MemoryCache, RedisCache};
use ironlog_server::config::Config;
use ironlog_server::state::{AppState, open_persistence};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing; IRONLOG_LOG_FORMAT=json switches to JSON lines
    let filter = EnvFilter::from_default_env().add_directive("ironlog_server=info".parse()?);
    if std::env::var("IRONLOG_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Ironlog Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        addr = %config.addr(),
        redis = config.redis_url.is_some(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Configuration loaded"
    );

    // Connect to database and run migrations
    info!("Connecting to database...");
    let persistence = open_persistence(&config.database_url).await?;
    info!("Database ready");

    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => {
            info!("Connecting to Redis...");
            Arc::new(RedisCache::connect(url).await?)
        }
        None => {
            warn!("IRONLOG_REDIS_URL not set, using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let verifier = Arc::new(JwtVerifier::from_config(&config.jwt)?);

    let state = AppState::new(persistence, cache, verifier).with_cache_ttl(config.cache_ttl);

    let listener = TcpListener::bind(config.addr()).await?;
    ironlog_server::serve(listener, state).await?;

    info!("Shutdown complete");

    Ok(())
}
