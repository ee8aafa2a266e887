//! Durable task queue on top of Postgres `SELECT ... FOR UPDATE SKIP
//! LOCKED` — the broker-free job-table pattern (component C2).

mod error;
mod memory;
mod postgres;
mod queue;
mod types;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use postgres::{lane_from_str, PgQueue};
pub use queue::WorkQueue;
pub use types::{ClaimedTask, EnqueueOptions, Lane, ProgressMeta, TaskId};
