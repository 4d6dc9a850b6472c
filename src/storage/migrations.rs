// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Schema migrations
//!
//! Migrations are plain SQL applied at runtime, since the app opens its
//! database from a path only known on the device. Applied ids are recorded in
//! `_migrations`; each migration and its record commit in one transaction.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

struct Migration {
    id: i64,
    name: &'static str,
    sql: &'static str,
}

/// Schema history, oldest first. Never edit an entry once released.
const MIGRATIONS: &[Migration] = &[
    // `user_above_age_limit` is tri-state: NULL = never answered,
    // 1 = at or above the threshold, 0 = below.
    Migration {
        id: 1,
        name: "initial_schema",
        sql: r#"
CREATE TABLE IF NOT EXISTS Accounts (
    account_id TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    requires_age_gate INTEGER NOT NULL DEFAULT 0,
    user_above_age_limit INTEGER CHECK (user_above_age_limit IN (0, 1)),
    age_prompted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS AppSettings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#,
    },
    Migration {
        id: 2,
        name: "account_age_index",
        sql: "CREATE INDEX IF NOT EXISTS idx_accounts_age_gate \
              ON Accounts (requires_age_gate, user_above_age_limit)",
    },
];

/// Bring the schema up to date
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT id FROM _migrations")
        .fetch_all(pool)
        .await?;

    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.id)) {
        let mut tx = pool.begin().await?;
        (&mut *tx).execute(migration.sql).await?;
        sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
            .bind(migration.id)
            .bind(migration.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(id = migration.id, name = migration.name, "applied migration");
    }

    Ok(())
}
