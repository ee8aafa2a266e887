//! Control API error types, mapped to the status codes spec.md §6
//! mandates: 400 validation failures, 404 missing entities, 500 store
//! failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("batch not found: {0}")]
    BatchNotFound(gsp_core::BatchId),

    #[error("order not found: {0}")]
    OrderNotFound(gsp_core::OrderId),

    #[error("screenshot not found: {0}")]
    ScreenshotNotFound(String),

    #[error(transparent)]
    Orchestrator(#[from] gsp_orchestrator::OrchestratorError),

    #[error(transparent)]
    Store(#[from] gsp_store::StoreError),

    #[error(transparent)]
    Queue(#[from] gsp_queue::QueueError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(_) | ApiError::Csv(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::BatchNotFound(_) | ApiError::OrderNotFound(_) | ApiError::ScreenshotNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Orchestrator(gsp_orchestrator::OrchestratorError::BatchNotFound(_))
            | ApiError::Orchestrator(gsp_orchestrator::OrchestratorError::OrderNotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Orchestrator(
                gsp_orchestrator::OrchestratorError::BatchNotStartable(_)
                | gsp_orchestrator::OrchestratorError::OrderNotRetriable(_),
            ) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Orchestrator(_) | ApiError::Store(_) | ApiError::Queue(_) | ApiError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
