// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::warn;

use super::Envelope;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Whether the server is healthy (database reachable).
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Server uptime in milliseconds.
    pub uptime_ms: i64,
}

/// `GET /health`; 503 while the database is unreachable.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state
        .persistence
        .health_check_db()
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Database health check failed");
            false
        });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Envelope::data(HealthCheckResponse {
            healthy,
            version: state.version.clone(),
            uptime_ms: state.uptime_ms(),
        }),
    )
}
