// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for ironlog-server API tests.
//!
//! Provides TestContext, which wires the full router to an in-memory SQLite
//! store, an in-process cache and an HS256 token verifier.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;

use ironlog_server::auth::JwtVerifier;
use ironlog_server::cache::MemoryCache;
use ironlog_server::state::{AppState, open_persistence};
use ironlog_server::build_router;

pub const SECRET: &[u8] = b"ironlog-test-secret";

/// Test context that owns the router and its cache.
pub struct TestContext {
    pub router: Router,
    pub cache: Arc<MemoryCache>,
    pub state: AppState,
}

impl TestContext {
    pub async fn new() -> Self {
        let persistence = open_persistence("sqlite::memory:")
            .await
            .expect("in-memory store");
        let cache = Arc::new(MemoryCache::new());
        let state = AppState::new(
            persistence,
            cache.clone(),
            Arc::new(JwtVerifier::hs256(SECRET)),
        );

        Self {
            router: build_router(state.clone()),
            cache,
            state,
        }
    }

    /// Send a request and decode the JSON response body (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Create an exercise for the token's user and return its id.
    pub async fn create_exercise(&self, token: &str, name: &str, body_part: &str) -> String {
        let (status, body) = self
            .post(
                "/api/exercises",
                token,
                json!({ "name": name, "bodyPart": body_part, "type": "compound" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().expect("exercise id").to_string()
    }

    /// Create a routine with one slot per exercise and return its id.
    pub async fn create_routine(&self, token: &str, name: &str, exercises: &[&str]) -> String {
        let routine_data: Vec<Value> = exercises
            .iter()
            .map(|id| json!({ "exercise": id, "progress": [{ "weight": 50, "sets": 3, "reps": 10 }] }))
            .collect();
        let (status, body) = self
            .post(
                "/api/routines",
                token,
                json!({ "name": name, "routineData": routine_data }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().expect("routine id").to_string()
    }
}

/// Sign an HS256 identity token that expires in ten minutes.
pub fn token_for(uid: &str, email: Option<&str>, name: Option<&str>) -> String {
    token_with_secret(uid, email, name, SECRET)
}

pub fn token_with_secret(uid: &str, email: Option<&str>, name: Option<&str>, secret: &[u8]) -> String {
    let exp = chrono::Utc::now().timestamp() + 600;
    let mut claims = json!({ "sub": uid, "exp": exp });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    if let Some(name) = name {
        claims["name"] = json!(name);
    }

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("token")
}

/// Token for a user that is auto-created on first request.
pub fn user_token(uid: &str) -> String {
    token_for(uid, Some(&format!("{}@example.com", uid)), Some(uid))
}
