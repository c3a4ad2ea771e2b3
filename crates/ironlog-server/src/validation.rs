// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON Schema validation of request bodies.
//!
//! Bodies are validated as raw JSON before deserialization so that every
//! violation is reported at once, joined with `,` into a single 400 message.

use once_cell::sync::Lazy;

use axum::Json;
use axum::extract::{FromRequest, Request};
use ironlog_core::model::{
    NewExercise, NewProgress, NewRoutine, NewWorkoutLog, RoutineUpdate, WorkoutLogUpdate,
};
use jsonschema::{Draft, Validator};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ApiError;

/// Request body type with a JSON Schema.
pub trait Schema: DeserializeOwned {
    /// Compiled validator for this body.
    fn validator() -> &'static Validator;
}

/// Collect every violation of `value` against `T`'s schema.
pub fn validate<T: Schema>(value: &Value) -> Result<(), ApiError> {
    let messages: Vec<String> = T::validator()
        .iter_errors(value)
        .map(|e| e.to_string())
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(messages.join(",")))
    }
}

/// Validate and deserialize a raw JSON value.
pub fn parse<T: Schema>(value: Value) -> Result<T, ApiError> {
    validate::<T>(&value)?;
    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Extractor for a JSON body that passed its schema.
#[derive(Debug, Clone)]
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: Schema,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        parse(value).map(Valid)
    }
}

fn compile(schema: Value) -> Validator {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .should_validate_formats(true)
        .build(&schema)
        .expect("request schemas are valid Draft 7")
}

// ============================================================================
// Schemas
// ============================================================================

static CREATE_EXERCISE: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "bodyPart": { "type": "string", "minLength": 1 },
            "type": { "type": "string", "enum": ["compound", "isolation"] }
        },
        "required": ["name", "bodyPart", "type"],
        "additionalProperties": false
    }))
});

static CREATE_PROGRESS: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "weight": { "type": "number" },
            "sets": { "type": "integer", "minimum": 0 },
            "reps": { "type": "integer", "minimum": 0 }
        },
        "required": ["weight", "sets", "reps"],
        "additionalProperties": false
    }))
});

static CREATE_ROUTINE: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1, "maxLength": 255 },
            "description": { "type": "string" },
            "routineData": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "exercise": { "type": "string", "minLength": 1 },
                        "progress": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "weight": { "type": "number" },
                                    "sets": { "type": "integer", "minimum": 0 },
                                    "reps": { "type": "integer", "minimum": 0 }
                                },
                                "required": ["sets", "reps"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["exercise", "progress"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["name", "routineData"],
        "additionalProperties": false
    }))
});

static UPDATE_ROUTINE: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1, "maxLength": 255 },
            "description": { "type": "string" }
        },
        "additionalProperties": false
    }))
});

static CREATE_LOG: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "workout": { "type": "string", "minLength": 1 },
            "completed": { "type": "boolean" }
        },
        "required": ["workout", "completed"],
        "additionalProperties": false
    }))
});

static UPDATE_LOG: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "completed": { "type": "boolean" }
        },
        "additionalProperties": false
    }))
});

pub(crate) static REGISTER_USER: Lazy<Validator> = Lazy::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "email": { "type": "string", "format": "email" },
            "username": { "type": "string", "pattern": "^[a-zA-Z0-9]+$" },
            "avatar": { "type": "string" }
        },
        "required": ["email", "username"],
        "additionalProperties": false
    }))
});

impl Schema for NewExercise {
    fn validator() -> &'static Validator {
        &CREATE_EXERCISE
    }
}

impl Schema for NewProgress {
    fn validator() -> &'static Validator {
        &CREATE_PROGRESS
    }
}

impl Schema for NewRoutine {
    fn validator() -> &'static Validator {
        &CREATE_ROUTINE
    }
}

impl Schema for RoutineUpdate {
    fn validator() -> &'static Validator {
        &UPDATE_ROUTINE
    }
}

impl Schema for NewWorkoutLog {
    fn validator() -> &'static Validator {
        &CREATE_LOG
    }
}

impl Schema for WorkoutLogUpdate {
    fn validator() -> &'static Validator {
        &UPDATE_LOG
    }
}
