// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workout log endpoints.

use axum::extract::{Path, State};
use ironlog_core::model::{NewWorkoutLog, WorkoutLog, WorkoutLogUpdate, WorkoutLogView};
use tracing::{info, instrument};

use super::Envelope;
use crate::auth::CurrentUser;
use crate::cache::{self, keys};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validation::Valid;

/// Which logs a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFilter {
    /// Every log.
    All,
    /// Only completed sessions.
    Completed,
    /// Only sessions not yet completed.
    Pending,
}

impl LogFilter {
    /// Completion flag the store filters on.
    pub fn completed(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Completed => Some(true),
            Self::Pending => Some(false),
        }
    }

    /// Cache key suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Completed => "completed",
            Self::Pending => "pending",
        }
    }
}

async fn list_filtered(
    state: &AppState,
    user: &CurrentUser,
    filter: LogFilter,
) -> Result<Envelope<Vec<WorkoutLogView>>> {
    let (logs, source) = cache::read_through(
        state.cache.as_ref(),
        &keys::logs(&user.id, filter.as_str()),
        state.cache_ttl,
        || async {
            Ok::<_, ApiError>(
                state
                    .persistence
                    .list_workout_logs(&user.id, filter.completed())
                    .await?,
            )
        },
    )
    .await?;

    Ok(Envelope::data(logs).from_source(source))
}

/// `GET /api/logs`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<Vec<WorkoutLogView>>> {
    list_filtered(&state, &user, LogFilter::All).await
}

/// `GET /api/logs/completed`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn completed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<Vec<WorkoutLogView>>> {
    list_filtered(&state, &user, LogFilter::Completed).await
}

/// `GET /api/logs/pending`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn pending(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<Vec<WorkoutLogView>>> {
    list_filtered(&state, &user, LogFilter::Pending).await
}

/// `POST /api/logs`; the workout must be one of the caller's routines.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(body): Valid<NewWorkoutLog>,
) -> Result<Envelope<WorkoutLog>> {
    if state
        .persistence
        .find_routine(&body.workout, &user.id)
        .await?
        .is_none()
    {
        return Err(ApiError::BadRequest("Invalid workout".to_string()));
    }

    let log = state.persistence.create_workout_log(&user.id, &body).await?;

    cache::invalidate(state.cache.as_ref(), &keys::all_logs(&user.id)).await;
    info!(log_id = %log.id, workout = %log.workout, "Workout logged");

    Ok(Envelope::data(log))
}

/// `PATCH /api/logs/{id}`
#[instrument(skip_all, fields(user_id = %user.id, log_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Valid(body): Valid<WorkoutLogUpdate>,
) -> Result<Envelope<WorkoutLog>> {
    let log = state
        .persistence
        .update_workout_log(&id, &user.id, &body)
        .await?
        .ok_or(ApiError::NotFound("Log not found"))?;

    cache::invalidate(state.cache.as_ref(), &keys::all_logs(&user.id)).await;

    Ok(Envelope::data(log))
}

/// `DELETE /api/logs/{id}`
#[instrument(skip_all, fields(user_id = %user.id, log_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Envelope<()>> {
    if !state.persistence.delete_workout_log(&id, &user.id).await? {
        return Err(ApiError::NotFound("Log not found"));
    }

    cache::invalidate(state.cache.as_ref(), &keys::all_logs(&user.id)).await;

    Ok(Envelope::empty())
}
