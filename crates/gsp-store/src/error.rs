//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("batch not found: {0}")]
    BatchNotFound(gsp_core::BatchId),

    #[error("order not found: {0}")]
    OrderNotFound(gsp_core::OrderId),

    #[error("core error: {0}")]
    Core(#[from] gsp_core::CoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
