//! Two-phase grant-serial generator.
//!
//! `preview_next` is read-only and advisory: concurrent previews may
//! show the same number, which is fine because nothing is reserved.
//! `commit_next` reserves a number with a single atomic upsert, so two
//! concurrent commits on the same base pattern can never receive the
//! same sequence; SQLite's writer lock serializes the statement.

use sqlx::{SqliteConnection, SqliteExecutor};

use crate::errors::Result;

/// What the next committed sequence for `base_pattern` would be, without
/// reserving it.
pub async fn preview_next(ex: impl SqliteExecutor<'_>, base_pattern: &str) -> Result<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT last_sequence FROM serial_counters WHERE base_pattern = ?1")
            .bind(base_pattern)
            .fetch_optional(ex)
            .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0) + 1)
}

/// Atomically reserve and return the next sequence for `base_pattern`.
///
/// Runs on the caller's transaction so the reservation commits or rolls
/// back together with the ledger entry that uses it.
pub async fn commit_next(conn: &mut SqliteConnection, base_pattern: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO serial_counters (base_pattern, last_sequence)
        VALUES (?1, 1)
        ON CONFLICT (base_pattern) DO UPDATE SET last_sequence = last_sequence + 1
        RETURNING last_sequence
        "#,
    )
    .bind(base_pattern)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}
