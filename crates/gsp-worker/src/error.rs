//! Worker task error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] gsp_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] gsp_queue::QueueError),

    #[error("malformed task arguments: {0}")]
    MalformedArgs(String),

    #[error("order {0} not found")]
    OrderNotFound(gsp_core::OrderId),
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
