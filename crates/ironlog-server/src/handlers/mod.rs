// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers.
//!
//! Every response body is an envelope `{ "success": true, "data": ... }`.
//! Cached listings add `source`; the exercise listing also adds `count`.

pub mod auth;
pub mod exercises;
pub mod health;
pub mod logs;
pub mod routines;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::cache::Source;
use crate::error::ApiError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<Source>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// `{ success, data }`
    pub fn data(data: T) -> Self {
        Self {
            source: None,
            success: true,
            count: None,
            data: Some(data),
        }
    }

    /// Add the `source` of a cached listing.
    pub fn from_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Add an item `count`.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

impl Envelope<()> {
    /// `{ success }` with no payload.
    pub fn empty() -> Self {
        Self {
            source: None,
            success: true,
            count: None,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `201 Created` with an envelope.
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Envelope::data(data)).into_response()
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shapes() {
        let listing = serde_json::to_value(
            Envelope::data(vec![1, 2])
                .from_source(Source::Cache)
                .with_count(2),
        )
        .unwrap();
        assert_eq!(
            listing,
            serde_json::json!({ "source": "cache", "success": true, "count": 2, "data": [1, 2] })
        );

        let empty = serde_json::to_value(Envelope::empty()).unwrap();
        assert_eq!(empty, serde_json::json!({ "success": true }));
    }
}
