//! Core domain types for the GSP bulk-order dispatch bot.
//!
//! This crate provides the entities shared by every other crate in the
//! workspace:
//! - `Batch` / `BatchStatus`: an upload managed and reported on as a unit
//! - `Order` / `OrderStatus`: one consultora plus its product list
//! - `OrderProduct` / `ProductStatus`: one line item within an order
//! - `OrderLog` / `LogLevel`: the append-only per-order audit trail
//! - opaque id newtypes and the step-to-progress-percentage mapping

pub mod batch;
pub mod error;
pub mod ids;
pub mod log;
pub mod order;
pub mod product;
pub mod progress;

pub use batch::{Batch, BatchStats, BatchStatus};
pub use error::{CoreError, Result};
pub use ids::{BatchId, OrderId, OrderLogId, OrderProductId};
pub use log::{LogLevel, OrderLog, StepLogEntry};
pub use order::{Order, OrderPatch, OrderStatus};
pub use product::{OrderProduct, ProductStatus};
pub use progress::step_progress_percent;
