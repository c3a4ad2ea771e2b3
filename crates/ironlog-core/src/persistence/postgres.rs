// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence operations for ironlog-core.
//!
//! Provides all durable storage access functions for users, exercises,
//! routines with their progress history, and workout logs.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{
    Exercise, NewExercise, NewProgress, NewRoutine, NewUser, NewWorkoutLog, Routine,
    RoutineUpdate, User, UserRole, WorkoutLog, WorkoutLogUpdate, WorkoutLogView,
};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        crate::migrations::run_postgres(&pool).await?;

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Record Types
// ============================================================================

use super::{
    ExerciseRecord, Persistence, ProgressRecord, RoutineRecord, SlotRecord, SlotTailRecord,
    UserRecord, WorkoutLogRecord, WorkoutLogViewRecord, assemble_routines, default_avatar, new_id,
    next_progress_timestamp, now, plan_progress_append,
};

// ============================================================================
// User Operations
// ============================================================================

/// Get a user by identity-provider id.
pub async fn find_user_by_fid(pool: &PgPool, fid: &str) -> Result<Option<User>, CoreError> {
    let record = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, fid, email, username, role, avatar, created_at, updated_at
        FROM users
        WHERE fid = $1
        "#,
    )
    .bind(fid)
    .fetch_optional(pool)
    .await?;

    record.map(User::try_from).transpose()
}

/// Get a user by email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, CoreError> {
    let record = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, fid, email, username, role, avatar, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    record.map(User::try_from).transpose()
}

/// Create a user with the `user` role.
///
/// Returns `AlreadyExists` when the fid or email is taken.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User, CoreError> {
    let id = new_id();
    let created_at = now();
    let avatar = user
        .avatar
        .clone()
        .unwrap_or_else(|| default_avatar(created_at));

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, fid, email, username, role, avatar, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(&user.fid)
    .bind(&user.email)
    .bind(&user.username)
    .bind(UserRole::User.as_str())
    .bind(&avatar)
    .bind(created_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::AlreadyExists {
            entity: "user",
            key: user.email.clone(),
        });
    }

    Ok(User {
        id,
        fid: user.fid.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
        role: UserRole::User,
        avatar,
        created_at,
        updated_at: created_at,
    })
}

// ============================================================================
// Exercise Operations
// ============================================================================

/// List shared exercises plus those owned by `owner`.
pub async fn list_exercises(pool: &PgPool, owner: &str) -> Result<Vec<Exercise>, CoreError> {
    let records = sqlx::query_as::<_, ExerciseRecord>(
        r#"
        SELECT id, name, body_part, exercise_type, owner_id, created_at, updated_at
        FROM exercises
        WHERE owner_id IS NULL OR owner_id = $1
        ORDER BY name, id
        "#,
    )
    .bind(owner)
    .fetch_all(pool)
    .await?;

    records.into_iter().map(Exercise::try_from).collect()
}

/// Insert an exercise owned by `owner`.
pub async fn create_exercise(
    pool: &PgPool,
    owner: &str,
    exercise: &NewExercise,
) -> Result<Exercise, CoreError> {
    let id = new_id();
    let created_at = now();

    sqlx::query(
        r#"
        INSERT INTO exercises (id, name, body_part, exercise_type, owner_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(&id)
    .bind(&exercise.name)
    .bind(&exercise.body_part)
    .bind(exercise.exercise_type.as_str())
    .bind(owner)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Exercise {
        id,
        name: exercise.name.clone(),
        body_part: exercise.body_part.clone(),
        exercise_type: exercise.exercise_type,
        owner: Some(owner.to_string()),
        created_at,
        updated_at: created_at,
    })
}

/// True when every id names an existing exercise.
pub async fn exercises_exist(pool: &PgPool, ids: &[String]) -> Result<bool, CoreError> {
    if ids.is_empty() {
        return Ok(true);
    }

    let mut distinct = ids.to_vec();
    distinct.sort();
    distinct.dedup();

    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercises WHERE id = ANY($1)")
        .bind(&distinct)
        .fetch_one(pool)
        .await?;

    Ok(found == distinct.len() as i64)
}

/// Delete an exercise visible to `owner`.
///
/// Shared entries are only eligible when `include_shared` is set. Returns
/// `InUse` while any routine slot still references the exercise.
pub async fn delete_exercise(
    pool: &PgPool,
    id: &str,
    owner: &str,
    include_shared: bool,
) -> Result<bool, CoreError> {
    let mut tx = pool.begin().await?;

    let owner_id: Option<Option<String>> =
        sqlx::query_scalar("SELECT owner_id FROM exercises WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let permitted = match owner_id {
        None => false,
        Some(Some(ref o)) => o == owner,
        Some(None) => include_shared,
    };
    if !permitted {
        return Ok(false);
    }

    let references: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM routine_data WHERE exercise_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if references > 0 {
        return Err(CoreError::InUse {
            entity: "exercise",
            id: id.to_string(),
        });
    }

    sqlx::query("DELETE FROM exercises WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

// ============================================================================
// Routine Operations
// ============================================================================

/// Load populated routines for `owner`, optionally narrowed to one id.
pub async fn load_routines(
    pool: &PgPool,
    owner: &str,
    routine_id: Option<&str>,
) -> Result<Vec<Routine>, CoreError> {
    let routines = sqlx::query_as::<_, RoutineRecord>(
        r#"
        SELECT id, name, description, owner_id, created_at, updated_at
        FROM routines r
        WHERE r.owner_id = $1 AND ($2::text IS NULL OR r.id = $2)
        ORDER BY r.created_at DESC, r.id
        "#,
    )
    .bind(owner)
    .bind(routine_id)
    .fetch_all(pool)
    .await?;

    if routines.is_empty() {
        return Ok(Vec::new());
    }

    let slots = sqlx::query_as::<_, SlotRecord>(
        r#"
        SELECT rd.id, rd.routine_id, rd.position,
               e.id AS exercise_id, e.name AS exercise_name, e.body_part,
               e.exercise_type, e.owner_id AS exercise_owner_id,
               e.created_at AS exercise_created_at, e.updated_at AS exercise_updated_at
        FROM routine_data rd
        JOIN routines r ON r.id = rd.routine_id
        JOIN exercises e ON e.id = rd.exercise_id
        WHERE r.owner_id = $1 AND ($2::text IS NULL OR r.id = $2)
        ORDER BY rd.routine_id, rd.position
        "#,
    )
    .bind(owner)
    .bind(routine_id)
    .fetch_all(pool)
    .await?;

    let progress = sqlx::query_as::<_, ProgressRecord>(
        r#"
        SELECT p.id, p.routine_data_id, p.position, p.weight, p.sets, p.reps, p.created_at
        FROM progress_entries p
        JOIN routine_data rd ON rd.id = p.routine_data_id
        JOIN routines r ON r.id = rd.routine_id
        WHERE r.owner_id = $1 AND ($2::text IS NULL OR r.id = $2)
        ORDER BY p.routine_data_id, p.position
        "#,
    )
    .bind(owner)
    .bind(routine_id)
    .fetch_all(pool)
    .await?;

    assemble_routines(routines, slots, progress)
}

/// Get one populated routine owned by `owner`.
pub async fn find_routine(
    pool: &PgPool,
    id: &str,
    owner: &str,
) -> Result<Option<Routine>, CoreError> {
    Ok(load_routines(pool, owner, Some(id)).await?.into_iter().next())
}

async fn insert_progress(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    routine_data_id: &str,
    position: i64,
    progress: &NewProgress,
    created_at: DateTime<Utc>,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO progress_entries (id, routine_data_id, position, weight, sets, reps, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(routine_data_id)
    .bind(position)
    .bind(progress.weight)
    .bind(progress.sets)
    .bind(progress.reps)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Create a routine with its slots and initial progress in one transaction.
pub async fn create_routine(
    pool: &PgPool,
    owner: &str,
    routine: &NewRoutine,
) -> Result<Routine, CoreError> {
    let routine_id = new_id();
    let created_at = now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO routines (id, name, description, owner_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(&routine_id)
    .bind(&routine.name)
    .bind(&routine.description)
    .bind(owner)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    for (position, slot) in routine.routine_data.iter().enumerate() {
        let slot_id = new_id();
        sqlx::query(
            r#"
            INSERT INTO routine_data (id, routine_id, exercise_id, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&slot_id)
        .bind(&routine_id)
        .bind(&slot.exercise)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;

        let mut last: Option<DateTime<Utc>> = None;
        for (entry_position, entry) in slot.progress.iter().enumerate() {
            let entry_at = next_progress_timestamp(last, created_at);
            insert_progress(&mut tx, &new_id(), &slot_id, entry_position as i64, entry, entry_at)
                .await?;
            last = Some(entry_at);
        }
    }

    tx.commit().await?;

    debug!(routine_id = %routine_id, slots = routine.routine_data.len(), "Routine created");

    find_routine(pool, &routine_id, owner)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "routine",
            id: routine_id,
        })
}

/// Patch name and description. Returns `None` when no owned routine matches.
pub async fn update_routine(
    pool: &PgPool,
    id: &str,
    owner: &str,
    update: &RoutineUpdate,
) -> Result<Option<Routine>, CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE routines
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            updated_at = $3
        WHERE id = $4 AND owner_id = $5
        "#,
    )
    .bind(&update.name)
    .bind(&update.description)
    .bind(now())
    .bind(id)
    .bind(owner)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_routine(pool, id, owner).await
}

/// Append one progress sample to every slot referencing `exercise_id`.
pub async fn append_progress(
    pool: &PgPool,
    routine_id: &str,
    owner: &str,
    exercise_id: &str,
    progress: &NewProgress,
) -> Result<Option<Routine>, CoreError> {
    let written_at = now();
    let mut tx = pool.begin().await?;

    // Concurrent appends to the same routine serialize on this row lock.
    let locked: Option<String> =
        sqlx::query_scalar("SELECT id FROM routines WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(routine_id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        return Ok(None);
    }

    let tails = sqlx::query_as::<_, SlotTailRecord>(
        r#"
        SELECT
            rd.id AS routine_data_id,
            (SELECT COALESCE(MAX(p.position) + 1, 0)
               FROM progress_entries p
              WHERE p.routine_data_id = rd.id) AS next_position,
            (SELECT p.created_at
               FROM progress_entries p
              WHERE p.routine_data_id = rd.id
              ORDER BY p.position DESC
              LIMIT 1) AS last_created_at
        FROM routine_data rd
        WHERE rd.routine_id = $1 AND rd.exercise_id = $2
        ORDER BY rd.position
        "#,
    )
    .bind(routine_id)
    .bind(exercise_id)
    .fetch_all(&mut *tx)
    .await?;

    let plan = plan_progress_append(tails, written_at);
    if plan.is_empty() {
        return Ok(None);
    }

    for insert in &plan {
        insert_progress(
            &mut tx,
            &insert.id,
            &insert.routine_data_id,
            insert.position,
            progress,
            insert.created_at,
        )
        .await?;
    }

    sqlx::query("UPDATE routines SET updated_at = $1 WHERE id = $2")
        .bind(written_at)
        .bind(routine_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    debug!(routine_id = %routine_id, exercise_id = %exercise_id, slots = plan.len(), "Progress appended");

    find_routine(pool, routine_id, owner).await
}

/// Delete a routine with its slots, progress and workout logs.
pub async fn delete_routine(pool: &PgPool, id: &str, owner: &str) -> Result<bool, CoreError> {
    let mut tx = pool.begin().await?;

    let locked: Option<String> =
        sqlx::query_scalar("SELECT id FROM routines WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
    if locked.is_none() {
        return Ok(false);
    }

    let progress = sqlx::query(
        r#"
        DELETE FROM progress_entries
        WHERE routine_data_id IN (SELECT id FROM routine_data WHERE routine_id = $1)
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let slots = sqlx::query("DELETE FROM routine_data WHERE routine_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let logs = sqlx::query("DELETE FROM workout_logs WHERE workout_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM routines WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    debug!(
        routine_id = %id,
        progress = progress.rows_affected(),
        slots = slots.rows_affected(),
        logs = logs.rows_affected(),
        "Routine deleted"
    );

    Ok(true)
}

// ============================================================================
// Workout Log Operations
// ============================================================================

/// List a user's logs with the workout and user summaries joined in.
pub async fn list_workout_logs(
    pool: &PgPool,
    user: &str,
    completed: Option<bool>,
) -> Result<Vec<WorkoutLogView>, CoreError> {
    let records = sqlx::query_as::<_, WorkoutLogViewRecord>(
        r#"
        SELECT l.id, l.completed, l.created_at, l.updated_at,
               r.id AS workout_id, r.name AS workout_name, r.description AS workout_description,
               u.id AS user_id, u.fid AS user_fid, u.username, u.email, u.avatar
        FROM workout_logs l
        JOIN routines r ON r.id = l.workout_id
        JOIN users u ON u.id = l.user_id
        WHERE l.user_id = $1 AND ($2::boolean IS NULL OR l.completed = $2)
        ORDER BY l.created_at DESC, l.id
        "#,
    )
    .bind(user)
    .bind(completed)
    .fetch_all(pool)
    .await?;

    Ok(records.into_iter().map(WorkoutLogView::from).collect())
}

/// Get a single log by id.
pub async fn get_workout_log(pool: &PgPool, id: &str) -> Result<Option<WorkoutLog>, CoreError> {
    let record = sqlx::query_as::<_, WorkoutLogRecord>(
        r#"
        SELECT id, workout_id, user_id, completed, created_at, updated_at
        FROM workout_logs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record.map(WorkoutLog::from))
}

/// Record a workout session for `user`.
pub async fn create_workout_log(
    pool: &PgPool,
    user: &str,
    log: &NewWorkoutLog,
) -> Result<WorkoutLog, CoreError> {
    let id = new_id();
    let created_at = now();

    sqlx::query(
        r#"
        INSERT INTO workout_logs (id, workout_id, user_id, completed, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(&id)
    .bind(&log.workout)
    .bind(user)
    .bind(log.completed)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(WorkoutLog {
        id,
        workout: log.workout.clone(),
        user: user.to_string(),
        completed: log.completed,
        created_at,
        updated_at: created_at,
    })
}

/// Update the completion flag of a log owned by `user`.
pub async fn update_workout_log(
    pool: &PgPool,
    id: &str,
    user: &str,
    update: &WorkoutLogUpdate,
) -> Result<Option<WorkoutLog>, CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE workout_logs
        SET completed = COALESCE($1, completed),
            updated_at = $2
        WHERE id = $3 AND user_id = $4
        "#,
    )
    .bind(update.completed)
    .bind(now())
    .bind(id)
    .bind(user)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_workout_log(pool, id).await
}

/// Delete a log owned by `user`.
pub async fn delete_workout_log(pool: &PgPool, id: &str, user: &str) -> Result<bool, CoreError> {
    let result = sqlx::query("DELETE FROM workout_logs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Database connectivity probe.
pub async fn health_check_db(pool: &PgPool) -> Result<bool, CoreError> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    Ok(row.0 == 1)
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn find_user_by_fid(&self, fid: &str) -> Result<Option<User>, CoreError> {
        find_user_by_fid(&self.pool, fid).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        find_user_by_email(&self.pool, email).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, CoreError> {
        create_user(&self.pool, user).await
    }

    async fn list_exercises(&self, owner: &str) -> Result<Vec<Exercise>, CoreError> {
        list_exercises(&self.pool, owner).await
    }

    async fn create_exercise(
        &self,
        owner: &str,
        exercise: &NewExercise,
    ) -> Result<Exercise, CoreError> {
        create_exercise(&self.pool, owner, exercise).await
    }

    async fn exercises_exist(&self, ids: &[String]) -> Result<bool, CoreError> {
        exercises_exist(&self.pool, ids).await
    }

    async fn delete_exercise(
        &self,
        id: &str,
        owner: &str,
        include_shared: bool,
    ) -> Result<bool, CoreError> {
        delete_exercise(&self.pool, id, owner, include_shared).await
    }

    async fn list_routines(&self, owner: &str) -> Result<Vec<Routine>, CoreError> {
        load_routines(&self.pool, owner, None).await
    }

    async fn find_routine(&self, id: &str, owner: &str) -> Result<Option<Routine>, CoreError> {
        find_routine(&self.pool, id, owner).await
    }

    async fn create_routine(
        &self,
        owner: &str,
        routine: &NewRoutine,
    ) -> Result<Routine, CoreError> {
        create_routine(&self.pool, owner, routine).await
    }

    async fn update_routine(
        &self,
        id: &str,
        owner: &str,
        update: &RoutineUpdate,
    ) -> Result<Option<Routine>, CoreError> {
        update_routine(&self.pool, id, owner, update).await
    }

    async fn append_progress(
        &self,
        routine_id: &str,
        owner: &str,
        exercise_id: &str,
        progress: &NewProgress,
    ) -> Result<Option<Routine>, CoreError> {
        append_progress(&self.pool, routine_id, owner, exercise_id, progress).await
    }

    async fn delete_routine(&self, id: &str, owner: &str) -> Result<bool, CoreError> {
        delete_routine(&self.pool, id, owner).await
    }

    async fn list_workout_logs(
        &self,
        user: &str,
        completed: Option<bool>,
    ) -> Result<Vec<WorkoutLogView>, CoreError> {
        list_workout_logs(&self.pool, user, completed).await
    }

    async fn create_workout_log(
        &self,
        user: &str,
        log: &NewWorkoutLog,
    ) -> Result<WorkoutLog, CoreError> {
        create_workout_log(&self.pool, user, log).await
    }

    async fn update_workout_log(
        &self,
        id: &str,
        user: &str,
        update: &WorkoutLogUpdate,
    ) -> Result<Option<WorkoutLog>, CoreError> {
        update_workout_log(&self.pool, id, user, update).await
    }

    async fn delete_workout_log(&self, id: &str, user: &str) -> Result<bool, CoreError> {
        delete_workout_log(&self.pool, id, user).await
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        health_check_db(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseType, NewRoutineData};

    // Helper to get a test database pool
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_IRONLOG_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        crate::migrations::run_postgres(&pool).await.ok()?;
        Some(pool)
    }

    // Users are unique per test so runs can share a database.
    async fn seed_user(pool: &PgPool) -> User {
        let fid = new_id();
        create_user(
            pool,
            &NewUser {
                fid: fid.clone(),
                email: format!("{}@example.com", fid),
                username: "lifter".to_string(),
                avatar: None,
            },
        )
        .await
        .expect("Failed to create test user")
    }

    async fn seed_exercise(pool: &PgPool, owner: &str) -> Exercise {
        create_exercise(
            pool,
            owner,
            &NewExercise {
                name: "Bench Press".to_string(),
                body_part: "chest".to_string(),
                exercise_type: ExerciseType::Compound,
            },
        )
        .await
        .expect("Failed to create test exercise")
    }

    #[tokio::test]
    async fn test_user_roundtrip_and_duplicate() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_IRONLOG_DATABASE_URL not set");
            return;
        };

        let user = seed_user(&pool).await;
        let found = find_user_by_fid(&pool, &user.fid).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let err = create_user(
            &pool,
            &NewUser {
                fid: user.fid.clone(),
                email: "other@example.com".to_string(),
                username: "dup".to_string(),
                avatar: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_routine_progress_and_cascade() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_IRONLOG_DATABASE_URL not set");
            return;
        };

        let user = seed_user(&pool).await;
        let bench = seed_exercise(&pool, &user.id).await;

        let routine = create_routine(
            &pool,
            &user.id,
            &NewRoutine {
                name: "Push".to_string(),
                description: None,
                routine_data: vec![NewRoutineData {
                    exercise: bench.id.clone(),
                    progress: vec![NewProgress {
                        weight: 100.0,
                        sets: 3,
                        reps: 5,
                    }],
                }],
            },
        )
        .await
        .unwrap();

        let updated = append_progress(
            &pool,
            &routine.id,
            &user.id,
            &bench.id,
            &NewProgress {
                weight: 105.0,
                sets: 3,
                reps: 5,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.routine_data[0].progress.len(), 2);

        create_workout_log(
            &pool,
            &user.id,
            &NewWorkoutLog {
                workout: routine.id.clone(),
                completed: false,
            },
        )
        .await
        .unwrap();

        let err = delete_exercise(&pool, &bench.id, &user.id, false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "IN_USE");

        assert!(delete_routine(&pool, &routine.id, &user.id).await.unwrap());
        assert!(find_routine(&pool, &routine.id, &user.id).await.unwrap().is_none());
        assert!(list_workout_logs(&pool, &user.id, None).await.unwrap().is_empty());
        assert!(delete_exercise(&pool, &bench.id, &user.id, false).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_every_entry() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_IRONLOG_DATABASE_URL not set");
            return;
        };

        let user = seed_user(&pool).await;
        let bench = seed_exercise(&pool, &user.id).await;
        let routine = create_routine(
            &pool,
            &user.id,
            &NewRoutine {
                name: "Push".to_string(),
                description: None,
                routine_data: vec![NewRoutineData {
                    exercise: bench.id.clone(),
                    progress: Vec::new(),
                }],
            },
        )
        .await
        .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                let (routine_id, owner, exercise_id) =
                    (routine.id.clone(), user.id.clone(), bench.id.clone());
                tokio::spawn(async move {
                    append_progress(
                        &pool,
                        &routine_id,
                        &owner,
                        &exercise_id,
                        &NewProgress {
                            weight: i as f64,
                            sets: 3,
                            reps: 5,
                        },
                    )
                    .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        let stored = find_routine(&pool, &routine.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        let progress = &stored.routine_data[0].progress;
        assert_eq!(progress.len(), 8);
        assert!(
            progress
                .windows(2)
                .all(|pair| pair[0].created_at < pair[1].created_at)
        );

        assert!(delete_routine(&pool, &routine.id, &user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_IRONLOG_DATABASE_URL not set");
            return;
        };

        assert!(health_check_db(&pool).await.unwrap());
    }
}
