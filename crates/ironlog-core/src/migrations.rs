// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded schema migrations, one set per backend.
//!
//! Both persistence backends apply their set on connect, so callers only need
//! these when preparing a database out of band, e.g. before a deploy:
//!
//! ```ignore
//! let pool = sqlx::PgPool::connect(&database_url).await?;
//! ironlog_core::migrations::run_postgres(&pool).await?;
//! ```

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{PgPool, SqlitePool};

/// Schema for `postgres://` databases (`migrations/postgresql`).
pub static POSTGRES: Migrator = sqlx::migrate!("./migrations/postgresql");

/// Schema for `sqlite:` databases (`migrations/sqlite`).
pub static SQLITE: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Bring a PostgreSQL database up to the current schema.
pub async fn run_postgres(pool: &PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Bring a SQLite database up to the current schema.
///
/// Applied versions are recorded in `_sqlx_migrations`; re-running is a no-op.
pub async fn run_sqlite(pool: &SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_sqlite_schema_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_sqlite(&pool).await.unwrap();
        run_sqlite(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied as usize, SQLITE.iter().count());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec![
                "exercises",
                "progress_entries",
                "routine_data",
                "routines",
                "users",
                "workout_logs"
            ]
        );
    }
}
