// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Profile registration and lookup.

use axum::extract::State;
use axum::response::Response;
use ironlog_core::error::CoreError;
use ironlog_core::model::{NewUser, User};
use jsonschema::Validator;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{Envelope, created};
use crate::auth::{CurrentUser, Identity};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validation::{REGISTER_USER, Schema, Valid};

const USER_EXISTS: &str = "User already exists";

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Contact email.
    pub email: String,
    /// Alphanumeric display name.
    pub username: String,
    /// Avatar URL; an identicon is generated when absent.
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Schema for RegisterRequest {
    fn validator() -> &'static Validator {
        &REGISTER_USER
    }
}

/// `POST /api/auth/register`: create the local profile of the verified identity.
#[instrument(skip_all, fields(fid = %identity.uid))]
pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    Valid(body): Valid<RegisterRequest>,
) -> Result<Response> {
    let persistence = state.persistence.as_ref();

    if persistence.find_user_by_email(&body.email).await?.is_some()
        || persistence.find_user_by_fid(&identity.uid).await?.is_some()
    {
        return Err(ApiError::BadRequest(USER_EXISTS.to_string()));
    }

    let user = persistence
        .create_user(&NewUser {
            fid: identity.uid,
            email: body.email,
            username: body.username,
            avatar: body.avatar,
        })
        .await
        .map_err(|e| match e {
            CoreError::AlreadyExists { .. } => ApiError::BadRequest(USER_EXISTS.to_string()),
            other => other.into(),
        })?;

    info!(user_id = %user.id, "User registered");

    Ok(created(user))
}

/// `GET /api/auth/me`
pub async fn me(user: CurrentUser) -> Envelope<User> {
    Envelope::data(user.0)
}
