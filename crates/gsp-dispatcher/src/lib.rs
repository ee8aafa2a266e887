//! Batch Dispatcher (C5): marks a batch running and fans its eligible
//! orders out to the `orders` lane.

pub mod dispatch;
pub mod error;

pub use dispatch::{BatchDispatcher, DispatchSummary};
pub use error::{DispatcherError, DispatcherResult};
