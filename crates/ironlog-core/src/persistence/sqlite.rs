// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;

use crate::error::CoreError;
use crate::migrations;
use crate::model::{
    Exercise, NewExercise, NewProgress, NewRoutine, NewUser, NewWorkoutLog, Routine,
    RoutineUpdate, User, UserRole, WorkoutLog, WorkoutLogUpdate, WorkoutLogView,
};

use super::{
    ExerciseRecord, Persistence, ProgressRecord, RoutineRecord, SlotRecord, SlotTailRecord,
    UserRecord, WorkoutLogRecord, WorkoutLogViewRecord, assemble_routines, default_avatar, new_id,
    next_progress_timestamp, now, plan_progress_append,
};

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a `sqlite:` URL and run migrations.
    ///
    /// `sqlite::memory:` opens a private database through [`Self::in_memory`].
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let connect_error = |e: sqlx::Error| CoreError::DatabaseError {
            operation: "connect".to_string(),
            details: format!("Failed to connect to SQLite at {}: {}", url, e),
        };

        // WAL lets readers run alongside the single writer; writers queue on
        // the busy timeout instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(url)
            .map_err(connect_error)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(connect_error)?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates parent directories and the database file when missing, then
    /// runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Private in-memory database with migrations applied.
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_routines(
        &self,
        owner: &str,
        routine_id: Option<&str>,
    ) -> Result<Vec<Routine>, CoreError> {
        let routines = sqlx::query_as::<_, RoutineRecord>(
            r#"
            SELECT id, name, description, owner_id, created_at, updated_at
            FROM routines r
            WHERE r.owner_id = ?1 AND (?2 IS NULL OR r.id = ?2)
            ORDER BY r.created_at DESC, r.id
            "#,
        )
        .bind(owner)
        .bind(routine_id)
        .fetch_all(&self.pool)
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
            WHERE r.owner_id = ?1 AND (?2 IS NULL OR r.id = ?2)
            ORDER BY rd.routine_id, rd.position
            "#,
        )
        .bind(owner)
        .bind(routine_id)
        .fetch_all(&self.pool)
        .await?;

        let progress = sqlx::query_as::<_, ProgressRecord>(
            r#"
            SELECT p.id, p.routine_data_id, p.position, p.weight, p.sets, p.reps, p.created_at
            FROM progress_entries p
            JOIN routine_data rd ON rd.id = p.routine_data_id
            JOIN routines r ON r.id = rd.routine_id
            WHERE r.owner_id = ?1 AND (?2 IS NULL OR r.id = ?2)
            ORDER BY p.routine_data_id, p.position
            "#,
        )
        .bind(owner)
        .bind(routine_id)
        .fetch_all(&self.pool)
        .await?;

        assemble_routines(routines, slots, progress)
    }

    async fn get_workout_log(&self, id: &str) -> Result<Option<WorkoutLog>, CoreError> {
        let record = sqlx::query_as::<_, WorkoutLogRecord>(
            r#"
            SELECT id, workout_id, user_id, completed, created_at, updated_at
            FROM workout_logs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(WorkoutLog::from))
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn find_user_by_fid(&self, fid: &str) -> Result<Option<User>, CoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, fid, email, username, role, avatar, created_at, updated_at
            FROM users
            WHERE fid = ?
            "#,
        )
        .bind(fid)
        .fetch_optional(&self.pool)
        .await?;

        record.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, fid, email, username, role, avatar, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        record.map(User::try_from).transpose()
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, CoreError> {
        let id = new_id();
        let created_at = now();
        let avatar = user
            .avatar
            .clone()
            .unwrap_or_else(|| default_avatar(created_at));

        // Duplicate fid or email inserts nothing.
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, fid, email, username, role, avatar, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
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
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyExists {
                entity: "user",
                key: user.email.clone(),
            });
        }

        debug!(user_id = %id, "User created");

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

    async fn list_exercises(&self, owner: &str) -> Result<Vec<Exercise>, CoreError> {
        let records = sqlx::query_as::<_, ExerciseRecord>(
            r#"
            SELECT id, name, body_part, exercise_type, owner_id, created_at, updated_at
            FROM exercises
            WHERE owner_id IS NULL OR owner_id = ?
            ORDER BY name, id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Exercise::try_from).collect()
    }

    async fn create_exercise(
        &self,
        owner: &str,
        exercise: &NewExercise,
    ) -> Result<Exercise, CoreError> {
        let id = new_id();
        let created_at = now();

        sqlx::query(
            r#"
            INSERT INTO exercises (id, name, body_part, exercise_type, owner_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(&exercise.name)
        .bind(&exercise.body_part)
        .bind(exercise.exercise_type.as_str())
        .bind(owner)
        .bind(created_at)
        .execute(&self.pool)
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

    async fn exercises_exist(&self, ids: &[String]) -> Result<bool, CoreError> {
        for id in ids {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercises WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            if count == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn delete_exercise(
        &self,
        id: &str,
        owner: &str,
        include_shared: bool,
    ) -> Result<bool, CoreError> {
        let mut tx = self.pool.begin().await?;

        let owner_id: Option<Option<String>> =
            sqlx::query_scalar("SELECT owner_id FROM exercises WHERE id = ?")
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
            sqlx::query_scalar("SELECT COUNT(*) FROM routine_data WHERE exercise_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if references > 0 {
            return Err(CoreError::InUse {
                entity: "exercise",
                id: id.to_string(),
            });
        }

        sqlx::query("DELETE FROM exercises WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_routines(&self, owner: &str) -> Result<Vec<Routine>, CoreError> {
        self.load_routines(owner, None).await
    }

    async fn find_routine(&self, id: &str, owner: &str) -> Result<Option<Routine>, CoreError> {
        Ok(self.load_routines(owner, Some(id)).await?.into_iter().next())
    }

    async fn create_routine(
        &self,
        owner: &str,
        routine: &NewRoutine,
    ) -> Result<Routine, CoreError> {
        let routine_id = new_id();
        let created_at = now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO routines (id, name, description, owner_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
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
                VALUES (?, ?, ?, ?)
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

        self.find_routine(&routine_id, owner)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "routine",
                id: routine_id,
            })
    }

    async fn update_routine(
        &self,
        id: &str,
        owner: &str,
        update: &RoutineUpdate,
    ) -> Result<Option<Routine>, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE routines
            SET name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                updated_at = ?3
            WHERE id = ?4 AND owner_id = ?5
            "#,
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(now())
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_routine(id, owner).await
    }

    async fn append_progress(
        &self,
        routine_id: &str,
        owner: &str,
        exercise_id: &str,
        progress: &NewProgress,
    ) -> Result<Option<Routine>, CoreError> {
        let written_at = now();
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock, so the tails read
        // below cannot change until commit.
        let touched =
            sqlx::query("UPDATE routines SET updated_at = ? WHERE id = ? AND owner_id = ?")
                .bind(written_at)
                .bind(routine_id)
                .bind(owner)
                .execute(&mut *tx)
                .await?;
        if touched.rows_affected() == 0 {
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
            WHERE rd.routine_id = ? AND rd.exercise_id = ?
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

        tx.commit().await?;

        debug!(routine_id = %routine_id, exercise_id = %exercise_id, slots = plan.len(), "Progress appended");

        self.find_routine(routine_id, owner).await
    }

    async fn delete_routine(&self, id: &str, owner: &str) -> Result<bool, CoreError> {
        let mut tx = self.pool.begin().await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM routines WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner)
                .fetch_one(&mut *tx)
                .await?;
        if count == 0 {
            return Ok(false);
        }

        let progress = sqlx::query(
            r#"
            DELETE FROM progress_entries
            WHERE routine_data_id IN (SELECT id FROM routine_data WHERE routine_id = ?)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let slots = sqlx::query("DELETE FROM routine_data WHERE routine_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let logs = sqlx::query("DELETE FROM workout_logs WHERE workout_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM routines WHERE id = ?")
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

    async fn list_workout_logs(
        &self,
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
            WHERE l.user_id = ?1 AND (?2 IS NULL OR l.completed = ?2)
            ORDER BY l.created_at DESC, l.id
            "#,
        )
        .bind(user)
        .bind(completed)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(WorkoutLogView::from).collect())
    }

    async fn create_workout_log(
        &self,
        user: &str,
        log: &NewWorkoutLog,
    ) -> Result<WorkoutLog, CoreError> {
        let id = new_id();
        let created_at = now();

        sqlx::query(
            r#"
            INSERT INTO workout_logs (id, workout_id, user_id, completed, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(&log.workout)
        .bind(user)
        .bind(log.completed)
        .bind(created_at)
        .execute(&self.pool)
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

    async fn update_workout_log(
        &self,
        id: &str,
        user: &str,
        update: &WorkoutLogUpdate,
    ) -> Result<Option<WorkoutLog>, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workout_logs
            SET completed = COALESCE(?1, completed),
                updated_at = ?2
            WHERE id = ?3 AND user_id = ?4
            "#,
        )
        .bind(update.completed)
        .bind(now())
        .bind(id)
        .bind(user)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_workout_log(id).await
    }

    async fn delete_workout_log(&self, id: &str, user: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM workout_logs WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}

async fn insert_progress(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
    routine_data_id: &str,
    position: i64,
    progress: &NewProgress,
    created_at: DateTime<Utc>,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO progress_entries (id, routine_data_id, position, weight, sets, reps, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
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
