// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Key material used to verify identity tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtKey {
    /// Shared HMAC secret (HS256).
    Secret(String),
    /// PEM-encoded RSA public key (RS256).
    PublicKeyPem(String),
}

/// Identity token verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    /// Verification key.
    pub key: JwtKey,
    /// Expected `iss` claim; not checked when unset.
    pub issuer: Option<String>,
    /// Expected `aud` claim; not checked when unset.
    pub audience: Option<String>,
}

/// Ironlog server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP listen port
    pub port: u16,
    /// Redis URL for the list cache; in-memory cache when unset
    pub redis_url: Option<String>,
    /// Lifetime of cached list responses
    pub cache_ttl: Duration,
    /// Identity token verification
    pub jwt: JwtConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `IRONLOG_DATABASE_URL`: `postgres://` or `sqlite:` connection string
    /// - one of `IRONLOG_JWT_SECRET` (HS256) or `IRONLOG_JWT_PUBLIC_KEY` (RS256 PEM)
    ///
    /// Optional (with defaults):
    /// - `IRONLOG_PORT`: HTTP port (default: 5000)
    /// - `IRONLOG_REDIS_URL`: Redis URL (default: in-memory cache)
    /// - `IRONLOG_CACHE_TTL_SECS`: cache entry lifetime (default: 3600)
    /// - `IRONLOG_JWT_ISSUER`, `IRONLOG_JWT_AUDIENCE`: expected claims (default: unchecked)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("IRONLOG_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("IRONLOG_DATABASE_URL"))?;

        if !is_supported_database_url(&database_url) {
            return Err(ConfigError::Invalid(
                "IRONLOG_DATABASE_URL",
                "must start with postgres://, postgresql:// or sqlite:",
            ));
        }

        let port: u16 = std::env::var("IRONLOG_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("IRONLOG_PORT", "must be a valid port number"))?;

        let cache_ttl_secs: u64 = std::env::var("IRONLOG_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("IRONLOG_CACHE_TTL_SECS", "must be a positive integer")
            })?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "IRONLOG_CACHE_TTL_SECS",
                "must be a positive integer",
            ));
        }

        let key = match (optional("IRONLOG_JWT_SECRET"), optional("IRONLOG_JWT_PUBLIC_KEY")) {
            (Some(secret), None) => JwtKey::Secret(secret),
            (None, Some(pem)) => JwtKey::PublicKeyPem(pem),
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "IRONLOG_JWT_SECRET",
                    "cannot be combined with IRONLOG_JWT_PUBLIC_KEY",
                ));
            }
            (None, None) => return Err(ConfigError::Missing("IRONLOG_JWT_SECRET")),
        };

        Ok(Self {
            database_url,
            port,
            redis_url: optional("IRONLOG_REDIS_URL"),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            jwt: JwtConfig {
                key,
                issuer: optional("IRONLOG_JWT_ISSUER"),
                audience: optional("IRONLOG_JWT_AUDIENCE"),
            },
        })
    }

    /// Address the HTTP server binds to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn is_supported_database_url(url: &str) -> bool {
    ["postgres://", "postgresql://", "sqlite:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
