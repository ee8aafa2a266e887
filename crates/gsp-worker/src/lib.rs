//! Worker Task (C4): consumes one order id from the `orders` lane, loads
//! state from the Store, invokes the Browser Driver, writes back the
//! outcome, and triggers retries.

pub mod error;
pub mod outcome;
pub mod worker;

pub use error::{WorkerError, WorkerResult};
pub use outcome::TaskOutcome;
pub use worker::WorkerTask;
