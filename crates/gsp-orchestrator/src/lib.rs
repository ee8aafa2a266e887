//! Orchestrator (C6): start/pause/cancel/retry façade over the Store and
//! Queue, plus read-only batch/system stats.

pub mod error;
pub mod orchestrator;
pub mod stats;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
pub use stats::SystemStats;
