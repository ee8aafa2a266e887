//! Prometheus metrics and structured logging for the dispatch platform.
//!
//! Provides observability from day one: batch/order/driver-step metrics,
//! structured JSON-or-pretty logging, and a text-exposition helper for
//! the ambient `GET /metrics` endpoint.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};
