//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
