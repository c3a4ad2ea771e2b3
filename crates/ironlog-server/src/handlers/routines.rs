// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Routine endpoints, including progress recording and charts.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use ironlog_core::chart::{ChartSeries, extract_chart_data};
use ironlog_core::model::{NewProgress, NewRoutine, Routine, RoutineUpdate};
use ironlog_core::period::{TimePeriod, UnknownTimePeriod};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{Envelope, created};
use crate::auth::CurrentUser;
use crate::cache::{self, keys};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validation::Valid;

/// Query string of the chart endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    /// `week`, `month`, `year` or `all` (default).
    pub period: Option<String>,
}

impl ChartQuery {
    /// Resolve the requested window; absent means [`TimePeriod::All`].
    pub fn period(&self) -> std::result::Result<TimePeriod, UnknownTimePeriod> {
        self.period
            .as_deref()
            .map(str::parse)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

async fn invalidate_routine_views(state: &AppState, user: &str) {
    let mut stale = keys::all_logs(user);
    stale.push(keys::routines(user));
    cache::invalidate(state.cache.as_ref(), &stale).await;
}

/// `GET /api/routines`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<Vec<Routine>>> {
    let (routines, source) = cache::read_through(
        state.cache.as_ref(),
        &keys::routines(&user.id),
        state.cache_ttl,
        || async { Ok::<_, ApiError>(state.persistence.list_routines(&user.id).await?) },
    )
    .await?;

    Ok(Envelope::data(routines).from_source(source))
}

/// `GET /api/routines/{routine_id}`
#[instrument(skip_all, fields(user_id = %user.id, routine_id = %routine_id))]
pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(routine_id): Path<String>,
) -> Result<Envelope<Routine>> {
    let routine = state
        .persistence
        .find_routine(&routine_id, &user.id)
        .await?
        .ok_or(ApiError::NotFound("Routine not found"))?;

    Ok(Envelope::data(routine))
}

/// `GET /api/routines/{routine_id}/chart?period=`
#[instrument(skip_all, fields(user_id = %user.id, routine_id = %routine_id))]
pub async fn chart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(routine_id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Envelope<Vec<ChartSeries>>> {
    let period = query
        .period()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let routine = state
        .persistence
        .find_routine(&routine_id, &user.id)
        .await?
        .ok_or(ApiError::NotFound("Routine not found"))?;

    let series = extract_chart_data(&routine, period.cutoff(Utc::now()));
    debug!(%period, series = series.len(), "Chart extracted");

    Ok(Envelope::data(series))
}

/// `POST /api/routines`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(body): Valid<NewRoutine>,
) -> Result<Response> {
    if !state.persistence.exercises_exist(&body.exercise_ids()).await? {
        return Err(ApiError::BadRequest("Invalid exercise found".to_string()));
    }

    let routine = state.persistence.create_routine(&user.id, &body).await?;

    cache::invalidate(state.cache.as_ref(), &[keys::routines(&user.id)]).await;
    info!(routine_id = %routine.id, slots = routine.routine_data.len(), "Routine created");

    Ok(created(routine))
}

/// `PATCH /api/routines/{routine_id}`
#[instrument(skip_all, fields(user_id = %user.id, routine_id = %routine_id))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(routine_id): Path<String>,
    Valid(body): Valid<RoutineUpdate>,
) -> Result<Envelope<Routine>> {
    let routine = state
        .persistence
        .update_routine(&routine_id, &user.id, &body)
        .await?
        .ok_or(ApiError::NotFound("Routine not found"))?;

    invalidate_routine_views(&state, &user.id).await;

    Ok(Envelope::data(routine))
}

/// `DELETE /api/routines/{routine_id}`; removes slots, progress and logs with it.
#[instrument(skip_all, fields(user_id = %user.id, routine_id = %routine_id))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(routine_id): Path<String>,
) -> Result<Envelope<()>> {
    if !state.persistence.delete_routine(&routine_id, &user.id).await? {
        return Err(ApiError::NotFound("Routine not found!"));
    }

    invalidate_routine_views(&state, &user.id).await;
    info!("Routine deleted");

    Ok(Envelope::empty())
}

/// `POST /api/routines/{routine_id}/{exercise_id}/progress`
#[instrument(skip_all, fields(user_id = %user.id, routine_id = %routine_id, exercise_id = %exercise_id))]
pub async fn add_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((routine_id, exercise_id)): Path<(String, String)>,
    Valid(body): Valid<NewProgress>,
) -> Result<Envelope<Routine>> {
    let routine = state
        .persistence
        .append_progress(&routine_id, &user.id, &exercise_id, &body)
        .await?
        .ok_or(ApiError::NotFound("Routine not found"))?;

    cache::invalidate(state.cache.as_ref(), &[keys::routines(&user.id)]).await;

    Ok(Envelope::data(routine))
}
