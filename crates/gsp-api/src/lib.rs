//! Control API (component C7): the operator-facing HTTP surface over
//! batches, orders, stats and screenshots.

pub mod config;
pub mod error;
pub mod loader;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::run_server;
pub use state::AppState;
