// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ironlog-core.
//!
//! Provides a unified error type for store operations. The HTTP layer maps
//! these onto status codes.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while reading or writing the store.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// A record referenced by the operation does not exist.
    NotFound {
        /// Kind of record ("routine", "exercise", ...).
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// A record cannot be removed because other records still reference it.
    InUse {
        /// Kind of record.
        entity: &'static str,
        /// The id that is still referenced.
        id: String,
    },

    /// A unique field collides with an existing record.
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// The colliding value.
        key: String,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InUse { .. } => "IN_USE",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    pub(crate) fn decode(details: impl Into<String>) -> Self {
        Self::DatabaseError {
            operation: "decode".to_string(),
            details: details.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => {
                write!(f, "{} '{}' not found", capitalize(entity), id)
            }
            Self::InUse { entity, id } => {
                write!(f, "{} '{}' is still in use", capitalize(entity), id)
            }
            Self::AlreadyExists { entity, key } => {
                write!(f, "{} '{}' already exists", capitalize(entity), key)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::DatabaseError {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}
