//! Application error types, aggregating every component's error enum
//! behind one top-level type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] gsp_core::CoreError),

    #[error("store error: {0}")]
    Store(#[from] gsp_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] gsp_queue::QueueError),

    #[error("driver error: {0}")]
    Driver(#[from] gsp_driver::DriverError),

    #[error("worker error: {0}")]
    Worker(#[from] gsp_worker::WorkerError),

    #[error("dispatcher error: {0}")]
    Dispatcher(#[from] gsp_dispatcher::DispatcherError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] gsp_orchestrator::OrchestratorError),

    #[error("api error: {0}")]
    Api(#[from] gsp_api::ApiError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] gsp_telemetry::TelemetryError),

    #[error("preflight check failed: {0}")]
    Preflight(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
