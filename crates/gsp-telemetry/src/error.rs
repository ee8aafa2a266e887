//! Telemetry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("logging initialization failed: {0}")]
    LoggingInit(String),

    #[error("metrics encoding failed: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
