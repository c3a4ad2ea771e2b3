// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ironlog-server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ironlog_core::error::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message returned for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Not authorized to access this resource";

/// Message returned in place of internal error details.
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

/// API errors, rendered as `{ "success": false, "error": message }`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Malformed or invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or expired identity token.
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    /// Addressed resource does not exist or is not visible to the caller.
    #[error("{0}")]
    NotFound(&'static str),

    /// Store operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Anything else; details are logged, never returned.
    #[error("{0}")]
    Internal(String),
}

/// Result type using ApiError.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Core(err) => match err {
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::InUse { .. } => StatusCode::CONFLICT,
                CoreError::AlreadyExists { .. } | CoreError::ValidationError { .. } => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                Self::Core(err) => error!(error_code = err.error_code(), error = %err, "Request failed"),
                other => error!(error = %other, "Request failed"),
            }
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}
