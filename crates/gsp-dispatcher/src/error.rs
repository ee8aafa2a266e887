//! Dispatcher error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("store error: {0}")]
    Store(#[from] gsp_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] gsp_queue::QueueError),

    #[error("batch not found: {0}")]
    BatchNotFound(gsp_core::BatchId),
}

pub type DispatcherResult<T> = std::result::Result<T, DispatcherError>;
