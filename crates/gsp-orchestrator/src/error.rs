//! Orchestrator error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] gsp_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] gsp_queue::QueueError),

    #[error("dispatcher error: {0}")]
    Dispatcher(#[from] gsp_dispatcher::DispatcherError),

    #[error("batch not found: {0}")]
    BatchNotFound(gsp_core::BatchId),

    #[error("order not found: {0}")]
    OrderNotFound(gsp_core::OrderId),

    #[error("batch {0} is not in a startable state")]
    BatchNotStartable(gsp_core::BatchId),

    #[error("order {0} is not in a retriable state")]
    OrderNotRetriable(gsp_core::OrderId),
}

pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;
