// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ironlog Server - Workout Tracking HTTP API
//!
//! Exposes exercises, routines with their progress history, progress charts
//! and workout logs over a JSON REST API built on axum.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  Bearer ID token   ┌──────────────────────────────────┐
//! │  Client  │───────────────────►│  ironlog-server (axum)           │
//! └──────────┘                    │  require_user ─► handlers        │
//!                                 │      │              │    │       │
//!                                 │      ▼              ▼    ▼       │
//!                                 │ IdentityVerifier  Cache  Persistence
//!                                 └──────────────────────────────────┘
//!                                       (JWT)     (Redis/  (Postgres/
//!                                                 memory)   SQLite)
//! ```
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Database health, version, uptime |
//! | POST | `/api/auth/register` | Create the caller's local profile |
//! | GET | `/api/auth/me` | Current user |
//! | GET, POST | `/api/exercises` | List / create exercises |
//! | GET | `/api/exercises/grouped` | Exercises grouped by body part |
//! | DELETE | `/api/exercises/{id}` | Delete an exercise |
//! | GET, POST | `/api/routines` | List / create routines |
//! | GET, PATCH, DELETE | `/api/routines/{routineId}` | Read / rename / delete |
//! | GET | `/api/routines/{routineId}/chart?period=` | Weight trend per slot |
//! | POST | `/api/routines/{routineId}/{exerciseId}/progress` | Record progress |
//! | GET, POST | `/api/logs` | List / create workout logs |
//! | GET | `/api/logs/completed`, `/api/logs/pending` | Filtered logs |
//! | PATCH, DELETE | `/api/logs/{id}` | Update / delete a log |
//!
//! # Configuration
//!
//! See [`config::Config::from_env`].

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod validation;

pub use routes::{build_router, serve};
pub use state::AppState;
