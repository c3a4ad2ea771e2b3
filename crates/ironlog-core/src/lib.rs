// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ironlog Core - Workout Tracking Domain
//!
//! This crate holds everything below the HTTP layer of the workout tracker:
//! the record types, the progress chart aggregation and the persistence
//! backends.
//!
//! # Data Model
//!
//! ```text
//! ┌──────────────┐ owns  ┌───────────────┐ owns  ┌────────────────┐
//! │   Routine    │──────►│  RoutineData  │──────►│ ProgressEntry  │
//! │ name, owner  │  0..n │ (one slot per │  0..n │ weight, sets,  │
//! └──────────────┘       │   exercise)   │       │ reps, created  │
//!        ▲               └───────┬───────┘       └────────────────┘
//!        │ workout               │ references (by id)
//! ┌──────┴───────┐       ┌───────▼───────┐
//! │  WorkoutLog  │       │   Exercise    │  owner = None → shared catalog
//! │  completed   │       │ bodyPart,type │
//! └──────────────┘       └───────────────┘
//! ```
//!
//! Routines are always read back "populated": every slot carries its resolved
//! [`model::Exercise`] and its full progress history in insertion order.
//!
//! # Chart Extraction
//!
//! [`chart::extract_chart_data`] turns a populated routine and a cutoff
//! instant into one label/weight series per slot. The cutoff normally comes
//! from [`period::TimePeriod::cutoff`].
//!
//! # Persistence Backends
//!
//! | Backend | URL scheme | Migrations |
//! |---------|------------|------------|
//! | [`persistence::PostgresPersistence`] | `postgres://` | `migrations/postgresql` |
//! | [`persistence::SqlitePersistence`] | `sqlite:` | `migrations/sqlite` |
//!
//! # Modules
//!
//! - [`chart`]: Progress history to chart series projection
//! - [`error`]: Error types with stable error codes
//! - [`migrations`]: Embedded schema migrations
//! - [`model`]: Record and input types
//! - [`period`]: Symbolic time window to cutoff mapping
//! - [`persistence`]: Storage trait and sqlx backends

#![deny(missing_docs)]

/// Progress history to chart series projection.
pub mod chart;

/// Error types for store operations.
pub mod error;

/// Embedded database migrations.
pub mod migrations;

/// Records and inputs shared by the store and the API.
pub mod model;

/// Time window tokens for chart queries.
pub mod period;

/// Storage abstraction and its PostgreSQL/SQLite backends.
pub mod persistence;
