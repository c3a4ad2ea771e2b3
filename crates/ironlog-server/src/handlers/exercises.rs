// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Exercise catalog endpoints.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::Response;
use ironlog_core::model::{Exercise, NewExercise, UserRole};
use tracing::{info, instrument};

use super::{Envelope, created};
use crate::auth::CurrentUser;
use crate::cache::{self, keys};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validation::Valid;

/// Exercises keyed by body part, each group ordered by name.
pub type GroupedExercises = BTreeMap<String, Vec<Exercise>>;

/// Group a flat listing by body part, keeping the input order within groups.
pub fn group_by_body_part(exercises: Vec<Exercise>) -> GroupedExercises {
    let mut grouped = GroupedExercises::new();
    for exercise in exercises {
        grouped
            .entry(exercise.body_part.clone())
            .or_default()
            .push(exercise);
    }
    grouped
}

/// `GET /api/exercises`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<Vec<Exercise>>> {
    let (exercises, source) = cache::read_through(
        state.cache.as_ref(),
        &keys::exercises(&user.id),
        state.cache_ttl,
        || async { Ok::<_, ApiError>(state.persistence.list_exercises(&user.id).await?) },
    )
    .await?;

    let count = exercises.len();
    Ok(Envelope::data(exercises)
        .from_source(source)
        .with_count(count))
}

/// `GET /api/exercises/grouped`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn grouped(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Envelope<GroupedExercises>> {
    let (groups, source) = cache::read_through(
        state.cache.as_ref(),
        &keys::exercises_grouped(&user.id),
        state.cache_ttl,
        || async {
            let exercises = state.persistence.list_exercises(&user.id).await?;
            Ok::<_, ApiError>(group_by_body_part(exercises))
        },
    )
    .await?;

    Ok(Envelope::data(groups).from_source(source))
}

/// `POST /api/exercises`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(body): Valid<NewExercise>,
) -> Result<Response> {
    let exercise = state.persistence.create_exercise(&user.id, &body).await?;

    cache::invalidate(state.cache.as_ref(), &keys::all_exercises(&user.id)).await;
    info!(exercise_id = %exercise.id, "Exercise created");

    Ok(created(exercise))
}

/// `DELETE /api/exercises/{id}`; admins may also delete shared entries.
#[instrument(skip_all, fields(user_id = %user.id, exercise_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Envelope<()>> {
    let include_shared = user.role == UserRole::Admin;

    if !state
        .persistence
        .delete_exercise(&id, &user.id, include_shared)
        .await?
    {
        return Err(ApiError::NotFound("Exercise not found"));
    }

    cache::invalidate(state.cache.as_ref(), &keys::all_exercises(&user.id)).await;
    info!("Exercise deleted");

    Ok(Envelope::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ironlog_core::model::ExerciseType;

    fn exercise(name: &str, body_part: &str) -> Exercise {
        Exercise {
            id: format!("e-{}", name),
            name: name.to_string(),
            body_part: body_part.to_string(),
            exercise_type: ExerciseType::Compound,
            owner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_by_body_part() {
        let grouped = group_by_body_part(vec![
            exercise("Bench", "chest"),
            exercise("Curl", "arms"),
            exercise("Fly", "chest"),
        ]);

        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["arms", "chest"]);
        assert_eq!(
            grouped["chest"].iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["Bench", "Fly"]
        );
    }
}
