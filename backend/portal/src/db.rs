//! Database layer: pool setup, migrations, and the conflict-retry
//! helper shared by every budget-mutating operation.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::errors::{PortalError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)
        .map_err(PortalError::from)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// How many times a conflicted operation is re-run before the
/// `Conflict` surfaces to the caller.
const MAX_CONFLICT_RETRIES: u32 = 2;

/// Re-run `op` when it loses a write race.
///
/// The closure must re-read every budget figure it checks; the retry
/// repeats the whole check-then-act transaction, so a retried approval
/// that no longer fits fails `CapacityExceeded` instead of
/// overcommitting. Budget and lifecycle errors are never retried; the
/// condition will not resolve itself.
pub async fn retry_conflict<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(PortalError::Conflict(msg)) if attempt < MAX_CONFLICT_RETRIES => {
                attempt += 1;
                warn!("Write conflict ({msg}); retry {attempt}/{MAX_CONFLICT_RETRIES}");
                tokio::time::sleep(Duration::from_millis(25 * attempt as u64)).await;
            }
            other => return other,
        }
    }
}

/// Unix timestamp used for explicit `created_at` binds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
