// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record and input types.
//!
//! Records are what the store hands back (always populated); `New*` and
//! `*Update` types are what the API layer hands to the store after request
//! validation. All of them serialize with camelCase field names, which is the
//! JSON shape clients see.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Users
// ============================================================================

/// Role of a local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account.
    #[default]
    User,
    /// Administrator; may remove shared catalog entries.
    Admin,
}

impl UserRole {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::ValidationError {
                field: "role".to_string(),
                message: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Local user record, reconciled from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned id.
    pub id: String,
    /// Identity provider user id.
    pub fid: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub username: String,
    /// Account role.
    pub role: UserRole,
    /// Avatar URL.
    pub avatar: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a local user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Identity provider user id.
    pub fid: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub username: String,
    /// Avatar URL; a generated identicon is used when absent.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Public projection of a user embedded in workout log listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Store-assigned id.
    pub id: String,
    /// Identity provider user id.
    pub fid: String,
    /// Display name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Avatar URL.
    pub avatar: String,
}

// ============================================================================
// Exercises
// ============================================================================

/// Movement classification of an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    /// Multi-joint movement.
    Compound,
    /// Single-joint movement.
    Isolation,
}

impl ExerciseType {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Isolation => "isolation",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compound" => Ok(Self::Compound),
            "isolation" => Ok(Self::Isolation),
            other => Err(CoreError::ValidationError {
                field: "type".to_string(),
                message: format!("unknown exercise type '{}'", other),
            }),
        }
    }
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Store-assigned id.
    pub id: String,
    /// Exercise name, e.g. "Bench Press".
    pub name: String,
    /// Free-form body part tag, e.g. "chest".
    pub body_part: String,
    /// Movement classification.
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    /// Owning user; `None` for shared catalog entries.
    pub owner: Option<String>,
    /// When the exercise was created.
    pub created_at: DateTime<Utc>,
    /// When the exercise was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an exercise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExercise {
    /// Exercise name.
    pub name: String,
    /// Body part tag.
    pub body_part: String,
    /// Movement classification.
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
}

// ============================================================================
// Routines
// ============================================================================

/// One recorded performance sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    /// Store-assigned id.
    pub id: String,
    /// Load, unit defined by the client.
    pub weight: f64,
    /// Number of sets.
    pub sets: i32,
    /// Repetitions per set.
    pub reps: i32,
    /// Assigned by the store at write time; never changes afterwards.
    pub created_at: DateTime<Utc>,
}

/// Per-exercise slot of a routine with its progress history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineData {
    /// Store-assigned id.
    pub id: String,
    /// The referenced exercise, resolved by the store.
    pub exercise: Exercise,
    /// Progress entries in insertion order.
    pub progress: Vec<ProgressEntry>,
}

/// Named, owned collection of exercises with progress history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    /// Store-assigned id.
    pub id: String,
    /// Routine name.
    pub name: String,
    /// Optional free text.
    pub description: Option<String>,
    /// Owning user id.
    pub owner: String,
    /// Slots in creation order. The same exercise may appear more than once.
    pub routine_data: Vec<RoutineData>,
    /// When the routine was created.
    pub created_at: DateTime<Utc>,
    /// When the routine was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Routine fields embedded in workout log listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineSummary {
    /// Store-assigned id.
    pub id: String,
    /// Routine name.
    pub name: String,
    /// Optional free text.
    pub description: Option<String>,
}

/// A progress sample as submitted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgress {
    /// Load; zero when the client omitted it on routine creation.
    #[serde(default)]
    pub weight: f64,
    /// Number of sets.
    pub sets: i32,
    /// Repetitions per set.
    pub reps: i32,
}

/// A slot as submitted on routine creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoutineData {
    /// Id of an existing exercise.
    pub exercise: String,
    /// Initial progress history.
    #[serde(default)]
    pub progress: Vec<NewProgress>,
}

/// Input for creating a routine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoutine {
    /// Routine name.
    pub name: String,
    /// Optional free text.
    #[serde(default)]
    pub description: Option<String>,
    /// Slots in order.
    pub routine_data: Vec<NewRoutineData>,
}

impl NewRoutine {
    /// Distinct exercise ids referenced by this routine, in first-seen order.
    pub fn exercise_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.routine_data.len());
        for slot in &self.routine_data {
            if !ids.contains(&slot.exercise) {
                ids.push(slot.exercise.clone());
            }
        }
        ids
    }
}

/// Partial update of a routine's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineUpdate {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Workout logs
// ============================================================================

/// A scheduled or finished workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutLog {
    /// Store-assigned id.
    pub id: String,
    /// Routine performed in this session.
    pub workout: String,
    /// User who logged the session.
    pub user: String,
    /// Whether the session was completed.
    pub completed: bool,
    /// When the log was created.
    pub created_at: DateTime<Utc>,
    /// When the log was last modified.
    pub updated_at: DateTime<Utc>,
}

/// A workout log with its routine and user resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutLogView {
    /// Store-assigned id.
    pub id: String,
    /// Routine performed in this session.
    pub workout: RoutineSummary,
    /// User who logged the session.
    pub user: UserSummary,
    /// Whether the session was completed.
    pub completed: bool,
    /// When the log was created.
    pub created_at: DateTime<Utc>,
    /// When the log was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a workout log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkoutLog {
    /// Routine id.
    pub workout: String,
    /// Whether the session was completed.
    pub completed: bool,
}

/// Partial update of a workout log.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutLogUpdate {
    /// New completion flag.
    #[serde(default)]
    pub completed: Option<bool>,
}
