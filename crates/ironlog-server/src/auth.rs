// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity token verification and the request guards built on it.
//!
//! Clients authenticate with an ID token from the external identity provider
//! (`Authorization: Bearer <token>`). The server only verifies the token; it
//! never stores credentials. On first sight of a verified identity the local
//! user profile is created from the token claims.

use std::ops::Deref;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use ironlog_core::error::CoreError;
use ironlog_core::model::{NewUser, User};
use ironlog_core::persistence::Persistence;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{JwtConfig, JwtKey};
use crate::error::ApiError;
use crate::state::AppState;

/// A verified identity-provider principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider user id, stored locally as `fid`.
    pub uid: String,
    /// Email claim.
    pub email: Option<String>,
    /// Display name claim.
    pub name: Option<String>,
    /// Avatar URL claim.
    pub picture: Option<String>,
}

/// Token verification errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Signature, expiry, issuer or audience check failed.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Configured key material could not be parsed.
    #[error("invalid verification key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),
}

/// Verifies bearer tokens against the identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the identity it asserts.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// JWT verifier for HS256 (shared secret) or RS256 (public key) ID tokens.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier for tokens signed with a shared secret.
    pub fn hs256(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// Verifier for tokens signed with an RSA key, given its public half as PEM.
    pub fn rs256_pem(pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(AuthError::InvalidKey)?;
        Ok(Self::new(key, Algorithm::RS256))
    }

    /// Build from configuration.
    pub fn from_config(config: &JwtConfig) -> Result<Self, AuthError> {
        let mut verifier = match &config.key {
            JwtKey::Secret(secret) => Self::hs256(secret.as_bytes()),
            JwtKey::PublicKeyPem(pem) => Self::rs256_pem(pem.as_bytes())?,
        };
        if let Some(issuer) = &config.issuer {
            verifier = verifier.with_issuer(issuer);
        }
        if let Some(audience) = &config.audience {
            verifier = verifier.with_audience(audience);
        }
        Ok(verifier)
    }

    fn new(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// Require the `iss` claim to equal `issuer`.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require the `aud` claim to contain `audience`.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<IdTokenClaims>(token, &self.key, &self.validation)?;
        let claims = data.claims;

        Ok(Identity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

// ============================================================================
// Request guards
// ============================================================================

/// The local user behind the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;

    state.verifier.verify(token).await.map_err(|e| {
        debug!(error = %e, "Rejected identity token");
        ApiError::Unauthorized
    })
}

/// Middleware: verify the bearer token and expose the [`Identity`].
///
/// Does not touch the local user table.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware: verify the bearer token and expose the local [`CurrentUser`].
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate(&state, req.headers()).await?;
    let user = reconcile_user(state.persistence.as_ref(), &identity).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Find the local user for `identity`, creating it from the claims if missing.
pub async fn reconcile_user(
    persistence: &dyn Persistence,
    identity: &Identity,
) -> Result<User, ApiError> {
    if let Some(user) = persistence.find_user_by_fid(&identity.uid).await? {
        return Ok(user);
    }

    let email = identity.email.clone().ok_or(ApiError::Unauthorized)?;
    let username = identity.name.clone().unwrap_or_else(|| {
        email
            .split_once('@')
            .map_or(email.as_str(), |(local, _)| local)
            .to_string()
    });

    let new_user = NewUser {
        fid: identity.uid.clone(),
        email,
        username,
        avatar: identity.picture.clone(),
    };

    match persistence.create_user(&new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, fid = %user.fid, "Created local user from identity");
            Ok(user)
        }
        // Lost a race with a concurrent first request, or the email belongs to another fid.
        Err(CoreError::AlreadyExists { .. }) => persistence
            .find_user_by_fid(&identity.uid)
            .await?
            .ok_or(ApiError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use ironlog_core::persistence::SqlitePersistence;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn token(claims: serde_json::Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn exp_in(secs: i64) -> i64 {
        chrono::Utc::now().timestamp() + secs
    }

    #[tokio::test]
    async fn test_hs256_token_verifies() {
        let verifier = JwtVerifier::hs256(SECRET);
        let jwt = token(
            json!({"sub": "fid-1", "email": "a@example.com", "name": "Ada", "exp": exp_in(600)}),
            SECRET,
        );

        let identity = verifier.verify(&jwt).await.unwrap();

        assert_eq!(identity.uid, "fid-1");
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(identity.name.as_deref(), Some("Ada"));
        assert!(identity.picture.is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_and_expired_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);

        let forged = token(json!({"sub": "fid-1", "exp": exp_in(600)}), b"other");
        assert!(verifier.verify(&forged).await.is_err());

        let expired = token(json!({"sub": "fid-1", "exp": exp_in(-3600)}), SECRET);
        assert!(verifier.verify(&expired).await.is_err());

        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_issuer_and_audience_checked_when_configured() {
        let verifier = JwtVerifier::hs256(SECRET)
            .with_issuer("https://issuer.example")
            .with_audience("ironlog");

        let good = token(
            json!({"sub": "u", "iss": "https://issuer.example", "aud": "ironlog", "exp": exp_in(600)}),
            SECRET,
        );
        assert!(verifier.verify(&good).await.is_ok());

        let wrong_aud = token(
            json!({"sub": "u", "iss": "https://issuer.example", "aud": "other", "exp": exp_in(600)}),
            SECRET,
        );
        assert!(verifier.verify(&wrong_aud).await.is_err());

        let wrong_iss = token(
            json!({"sub": "u", "iss": "https://evil.example", "aud": "ironlog", "exp": exp_in(600)}),
            SECRET,
        );
        assert!(verifier.verify(&wrong_iss).await.is_err());
    }

    #[tokio::test]
    async fn test_audience_ignored_when_not_configured() {
        let verifier = JwtVerifier::hs256(SECRET);
        let jwt = token(json!({"sub": "u", "aud": "anything", "exp": exp_in(600)}), SECRET);

        assert!(verifier.verify(&jwt).await.is_ok());
    }

    #[test]
    fn test_invalid_public_key_rejected() {
        let result = JwtVerifier::from_config(&JwtConfig {
            key: JwtKey::PublicKeyPem("not a pem".to_string()),
            issuer: None,
            audience: None,
        });

        assert!(matches!(result, Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_reconcile_creates_then_reuses_user() {
        let store = SqlitePersistence::in_memory().await.unwrap();
        let identity = Identity {
            uid: "fid-7".to_string(),
            email: Some("lifter@example.com".to_string()),
            name: None,
            picture: Some("https://img.example/p.png".to_string()),
        };

        let created = reconcile_user(&store, &identity).await.unwrap();
        assert_eq!(created.fid, "fid-7");
        assert_eq!(created.username, "lifter");
        assert_eq!(created.avatar, "https://img.example/p.png");

        let again = reconcile_user(&store, &identity).await.unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn test_reconcile_without_email_is_unauthorized() {
        let store = SqlitePersistence::in_memory().await.unwrap();
        let identity = Identity {
            uid: "fid-8".to_string(),
            email: None,
            name: Some("anon".to_string()),
            picture: None,
        };

        let err = reconcile_user(&store, &identity).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
