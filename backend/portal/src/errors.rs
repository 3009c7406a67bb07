//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Write conflict: {0}")]
    Conflict(String),
}

/// SQLite result codes that signal a lost race with a concurrent
/// writer rather than a broken query: BUSY (5), LOCKED (6) and their
/// extended forms BUSY_SNAPSHOT (517) and LOCKED_SHAREDCACHE (262).
const CONFLICT_CODES: &[&str] = &["5", "6", "262", "517"];

impl From<sqlx::Error> for PortalError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if let Some(code) = db.code() {
                if CONFLICT_CODES.contains(&code.as_ref()) {
                    return PortalError::Conflict(db.message().to_string());
                }
            }
        }
        match e {
            sqlx::Error::RowNotFound => PortalError::NotFound("row not found".to_string()),
            other => PortalError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
