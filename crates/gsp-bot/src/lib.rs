//! Bulk-order dispatch bot: CLI, configuration, process wiring and the
//! top-level `AppError` (component gsp-bot, the `main` entrypoint over
//! C1–C7).

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
