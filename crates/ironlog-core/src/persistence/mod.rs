// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for ironlog-core.
//!
//! This module defines the persistence abstraction, the flat row types both
//! backends read, and the helpers that assemble rows into populated records.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{
    Exercise, NewExercise, NewProgress, NewRoutine, NewUser, NewWorkoutLog, ProgressEntry,
    Routine, RoutineData, RoutineSummary, RoutineUpdate, User, UserSummary, WorkoutLog,
    WorkoutLogUpdate, WorkoutLogView,
};

// ============================================================================
// Row Types
// ============================================================================

/// User row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    /// Primary key.
    pub id: String,
    /// Identity provider user id.
    pub fid: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub username: String,
    /// Role (user, admin).
    pub role: String,
    /// Avatar URL.
    pub avatar: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = CoreError;

    fn try_from(row: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            role: row.role.parse().map_err(|e: CoreError| CoreError::decode(e.to_string()))?,
            id: row.id,
            fid: row.fid,
            email: row.email,
            username: row.username,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Exercise row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExerciseRecord {
    /// Primary key.
    pub id: String,
    /// Exercise name.
    pub name: String,
    /// Body part tag.
    pub body_part: String,
    /// Movement classification (compound, isolation).
    pub exercise_type: String,
    /// Owning user, NULL for shared entries.
    pub owner_id: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ExerciseRecord> for Exercise {
    type Error = CoreError;

    fn try_from(row: ExerciseRecord) -> Result<Self, Self::Error> {
        Ok(Exercise {
            exercise_type: row
                .exercise_type
                .parse()
                .map_err(|e: CoreError| CoreError::decode(e.to_string()))?,
            id: row.id,
            name: row.name,
            body_part: row.body_part,
            owner: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Routine header row (without slots).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoutineRecord {
    /// Primary key.
    pub id: String,
    /// Routine name.
    pub name: String,
    /// Optional free text.
    pub description: Option<String>,
    /// Owning user.
    pub owner_id: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Routine slot row joined with its exercise.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SlotRecord {
    /// Slot primary key.
    pub id: String,
    /// Owning routine.
    pub routine_id: String,
    /// Order within the routine.
    pub position: i64,
    /// Referenced exercise id.
    pub exercise_id: String,
    /// Exercise name.
    pub exercise_name: String,
    /// Exercise body part.
    pub body_part: String,
    /// Exercise classification.
    pub exercise_type: String,
    /// Exercise owner.
    pub exercise_owner_id: Option<String>,
    /// Exercise creation time.
    pub exercise_created_at: DateTime<Utc>,
    /// Exercise modification time.
    pub exercise_updated_at: DateTime<Utc>,
}

impl SlotRecord {
    fn exercise(&self) -> Result<Exercise, CoreError> {
        Exercise::try_from(ExerciseRecord {
            id: self.exercise_id.clone(),
            name: self.exercise_name.clone(),
            body_part: self.body_part.clone(),
            exercise_type: self.exercise_type.clone(),
            owner_id: self.exercise_owner_id.clone(),
            created_at: self.exercise_created_at,
            updated_at: self.exercise_updated_at,
        })
    }
}

/// Progress entry row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgressRecord {
    /// Primary key.
    pub id: String,
    /// Owning slot.
    pub routine_data_id: String,
    /// Order within the slot.
    pub position: i64,
    /// Load.
    pub weight: f64,
    /// Number of sets.
    pub sets: i32,
    /// Repetitions per set.
    pub reps: i32,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl From<ProgressRecord> for ProgressEntry {
    fn from(row: ProgressRecord) -> Self {
        ProgressEntry {
            id: row.id,
            weight: row.weight,
            sets: row.sets,
            reps: row.reps,
            created_at: row.created_at,
        }
    }
}

/// Workout log row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkoutLogRecord {
    /// Primary key.
    pub id: String,
    /// Routine performed.
    pub workout_id: String,
    /// Logging user.
    pub user_id: String,
    /// Completion flag.
    pub completed: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl From<WorkoutLogRecord> for WorkoutLog {
    fn from(row: WorkoutLogRecord) -> Self {
        WorkoutLog {
            id: row.id,
            workout: row.workout_id,
            user: row.user_id,
            completed: row.completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Workout log row joined with its routine and user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkoutLogViewRecord {
    /// Primary key.
    pub id: String,
    /// Completion flag.
    pub completed: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
    /// Routine id.
    pub workout_id: String,
    /// Routine name.
    pub workout_name: String,
    /// Routine description.
    pub workout_description: Option<String>,
    /// User id.
    pub user_id: String,
    /// User identity provider id.
    pub user_fid: String,
    /// User display name.
    pub username: String,
    /// User email.
    pub email: String,
    /// User avatar.
    pub avatar: String,
}

impl From<WorkoutLogViewRecord> for WorkoutLogView {
    fn from(row: WorkoutLogViewRecord) -> Self {
        WorkoutLogView {
            id: row.id,
            workout: RoutineSummary {
                id: row.workout_id,
                name: row.workout_name,
                description: row.workout_description,
            },
            user: UserSummary {
                id: row.user_id,
                fid: row.user_fid,
                username: row.username,
                email: row.email,
                avatar: row.avatar,
            },
            completed: row.completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Assembly Helpers
// ============================================================================

/// Assemble routine headers, slots and progress rows into populated routines.
///
/// Slots and progress rows must arrive ordered by position; routine order is
/// taken from `routines`.
pub(crate) fn assemble_routines(
    routines: Vec<RoutineRecord>,
    slots: Vec<SlotRecord>,
    progress: Vec<ProgressRecord>,
) -> Result<Vec<Routine>, CoreError> {
    let mut progress_by_slot: HashMap<String, Vec<ProgressEntry>> = HashMap::new();
    for row in progress {
        progress_by_slot
            .entry(row.routine_data_id.clone())
            .or_default()
            .push(row.into());
    }

    let mut slots_by_routine: HashMap<String, Vec<RoutineData>> = HashMap::new();
    for slot in slots {
        let exercise = slot.exercise()?;
        let progress = progress_by_slot.remove(&slot.id).unwrap_or_default();
        slots_by_routine
            .entry(slot.routine_id.clone())
            .or_default()
            .push(RoutineData {
                id: slot.id,
                exercise,
                progress,
            });
    }

    Ok(routines
        .into_iter()
        .map(|row| Routine {
            routine_data: slots_by_routine.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            description: row.description,
            owner: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

/// Append tail of one slot, read under the routine's write lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SlotTailRecord {
    pub routine_data_id: String,
    pub next_position: i64,
    pub last_created_at: Option<DateTime<Utc>>,
}

/// A progress row to insert when appending to a routine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProgressInsert {
    pub id: String,
    pub routine_data_id: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Plan one progress insert per slot tail.
///
/// `tails` must come from the same transaction that performs the inserts;
/// an empty input gives an empty plan.
pub(crate) fn plan_progress_append(
    tails: Vec<SlotTailRecord>,
    now: DateTime<Utc>,
) -> Vec<ProgressInsert> {
    tails
        .into_iter()
        .map(|tail| ProgressInsert {
            id: new_id(),
            created_at: next_progress_timestamp(tail.last_created_at, now),
            routine_data_id: tail.routine_data_id,
            position: tail.next_position,
        })
        .collect()
}

/// Write timestamp for a new progress entry, strictly after the slot's last one.
pub(crate) fn next_progress_timestamp(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match last {
        Some(last) if last >= now => last + TimeDelta::microseconds(1),
        _ => now,
    }
}

/// Fresh record id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time at the precision both backends store.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Identicon avatar URL seeded from a timestamp.
pub fn default_avatar(seed: DateTime<Utc>) -> String {
    let digest = Sha256::digest(seed.to_rfc3339().as_bytes());
    let hash = hex::encode(&digest[..16]);
    format!("http://www.gravatar.com/avatar/{}?d=identicon", hash)
}

// ============================================================================
// Persistence Trait
// ============================================================================

/// Storage operations used by the API layer.
///
/// Every routine returned is populated: slots carry their resolved exercise
/// and full progress history. Owner-scoped lookups treat a record owned by
/// someone else exactly like a missing one.
#[async_trait]
pub trait Persistence: Send + Sync {
    // ---- users ----

    /// Find a user by identity provider id.
    async fn find_user_by_fid(&self, fid: &str) -> Result<Option<User>, CoreError>;

    /// Find a user by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    /// Create a user. Fails with `AlreadyExists` on a duplicate fid or email.
    async fn create_user(&self, user: &NewUser) -> Result<User, CoreError>;

    // ---- exercises ----

    /// Shared exercises plus the ones owned by `owner`, ordered by name.
    async fn list_exercises(&self, owner: &str) -> Result<Vec<Exercise>, CoreError>;

    /// Create an exercise owned by `owner`.
    async fn create_exercise(
        &self,
        owner: &str,
        exercise: &NewExercise,
    ) -> Result<Exercise, CoreError>;

    /// True when every id resolves to an existing exercise.
    async fn exercises_exist(&self, ids: &[String]) -> Result<bool, CoreError>;

    /// Delete an exercise owned by `owner` (any shared one when `include_shared`).
    ///
    /// Returns false when nothing matched; fails with `InUse` when a routine
    /// still references it.
    async fn delete_exercise(
        &self,
        id: &str,
        owner: &str,
        include_shared: bool,
    ) -> Result<bool, CoreError>;

    // ---- routines ----

    /// All routines of `owner`, newest first.
    async fn list_routines(&self, owner: &str) -> Result<Vec<Routine>, CoreError>;

    /// One routine of `owner`.
    async fn find_routine(&self, id: &str, owner: &str) -> Result<Option<Routine>, CoreError>;

    /// Create a routine with its slots and initial progress in one transaction.
    ///
    /// Callers check exercise existence first with [`Persistence::exercises_exist`].
    async fn create_routine(&self, owner: &str, routine: &NewRoutine)
    -> Result<Routine, CoreError>;

    /// Update name and/or description.
    async fn update_routine(
        &self,
        id: &str,
        owner: &str,
        update: &RoutineUpdate,
    ) -> Result<Option<Routine>, CoreError>;

    /// Append a progress entry to every slot of the routine referencing `exercise_id`.
    ///
    /// Returns `None` when the routine is missing or has no such slot.
    async fn append_progress(
        &self,
        routine_id: &str,
        owner: &str,
        exercise_id: &str,
        progress: &NewProgress,
    ) -> Result<Option<Routine>, CoreError>;

    /// Delete a routine together with its slots, progress and workout logs.
    ///
    /// Runs in a single transaction. Returns false when nothing matched.
    async fn delete_routine(&self, id: &str, owner: &str) -> Result<bool, CoreError>;

    // ---- workout logs ----

    /// Logs of `user`, optionally filtered by completion, newest first.
    async fn list_workout_logs(
        &self,
        user: &str,
        completed: Option<bool>,
    ) -> Result<Vec<WorkoutLogView>, CoreError>;

    /// Create a workout log for `user`.
    async fn create_workout_log(
        &self,
        user: &str,
        log: &NewWorkoutLog,
    ) -> Result<WorkoutLog, CoreError>;

    /// Update a log of `user`.
    async fn update_workout_log(
        &self,
        id: &str,
        user: &str,
        update: &WorkoutLogUpdate,
    ) -> Result<Option<WorkoutLog>, CoreError>;

    /// Delete a log of `user`. Returns false when nothing matched.
    async fn delete_workout_log(&self, id: &str, user: &str) -> Result<bool, CoreError>;

    // ---- health ----

    /// Check database connectivity.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseType;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn routine_row(id: &str) -> RoutineRecord {
        RoutineRecord {
            id: id.to_string(),
            name: format!("routine {}", id),
            description: None,
            owner_id: "u-1".to_string(),
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    fn slot_row(id: &str, routine_id: &str, position: i64, exercise_id: &str) -> SlotRecord {
        SlotRecord {
            id: id.to_string(),
            routine_id: routine_id.to_string(),
            position,
            exercise_id: exercise_id.to_string(),
            exercise_name: "Bench Press".to_string(),
            body_part: "chest".to_string(),
            exercise_type: "compound".to_string(),
            exercise_owner_id: None,
            exercise_created_at: ts(0),
            exercise_updated_at: ts(0),
        }
    }

    fn progress_row(id: &str, slot: &str, position: i64, weight: f64) -> ProgressRecord {
        ProgressRecord {
            id: id.to_string(),
            routine_data_id: slot.to_string(),
            position,
            weight,
            sets: 3,
            reps: 5,
            created_at: ts(position),
        }
    }

    #[test]
    fn test_assemble_routines_groups_rows() {
        let routines = vec![routine_row("r-2"), routine_row("r-1")];
        let slots = vec![
            slot_row("s-1", "r-1", 0, "e-1"),
            slot_row("s-2", "r-1", 1, "e-2"),
            slot_row("s-3", "r-2", 0, "e-1"),
        ];
        let progress = vec![
            progress_row("p-1", "s-1", 0, 100.0),
            progress_row("p-2", "s-1", 1, 102.5),
            progress_row("p-3", "s-3", 0, 60.0),
        ];

        let assembled = assemble_routines(routines, slots, progress).unwrap();

        assert_eq!(assembled.len(), 2);
        assert_eq!(assembled[0].id, "r-2");
        assert_eq!(assembled[0].routine_data.len(), 1);
        assert_eq!(assembled[0].routine_data[0].progress[0].weight, 60.0);

        let r1 = &assembled[1];
        assert_eq!(r1.routine_data.len(), 2);
        assert_eq!(r1.routine_data[0].exercise.exercise_type, ExerciseType::Compound);
        assert_eq!(
            r1.routine_data[0]
                .progress
                .iter()
                .map(|p| p.weight)
                .collect::<Vec<_>>(),
            vec![100.0, 102.5]
        );
        assert!(r1.routine_data[1].progress.is_empty());
    }

    #[test]
    fn test_assemble_rejects_unknown_exercise_type() {
        let mut slot = slot_row("s-1", "r-1", 0, "e-1");
        slot.exercise_type = "cardio".to_string();

        let err = assemble_routines(vec![routine_row("r-1")], vec![slot], Vec::new()).unwrap_err();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_next_progress_timestamp_is_strictly_increasing() {
        let now = ts(10);
        assert_eq!(next_progress_timestamp(None, now), now);
        assert_eq!(next_progress_timestamp(Some(ts(5)), now), now);
        assert_eq!(
            next_progress_timestamp(Some(now), now),
            now + TimeDelta::microseconds(1)
        );
        assert_eq!(
            next_progress_timestamp(Some(ts(20)), now),
            ts(20) + TimeDelta::microseconds(1)
        );
    }

    #[test]
    fn test_plan_progress_append_continues_each_tail() {
        let tails = vec![
            SlotTailRecord {
                routine_data_id: "s-1".to_string(),
                next_position: 3,
                last_created_at: Some(ts(100)),
            },
            SlotTailRecord {
                routine_data_id: "s-3".to_string(),
                next_position: 0,
                last_created_at: None,
            },
        ];

        let plan = plan_progress_append(tails, ts(100));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].routine_data_id, "s-1");
        assert_eq!(plan[0].position, 3);
        assert_eq!(plan[0].created_at, ts(100) + TimeDelta::microseconds(1));
        assert_eq!(plan[1].routine_data_id, "s-3");
        assert_eq!(plan[1].position, 0);
        assert_eq!(plan[1].created_at, ts(100));
        assert_ne!(plan[0].id, plan[1].id);
        assert!(plan_progress_append(Vec::new(), ts(100)).is_empty());
    }

    #[test]
    fn test_default_avatar_is_identicon_url() {
        let avatar = default_avatar(ts(0));
        assert!(avatar.starts_with("http://www.gravatar.com/avatar/"));
        assert!(avatar.ends_with("?d=identicon"));
        assert_eq!(avatar, default_avatar(ts(0)));
        assert_ne!(avatar, default_avatar(ts(1)));
    }
}
