//! Shared queue types: lanes, task identifiers, enqueue options, claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named work lane. Workers only ever claim from `Orders`; the
/// dispatcher/retry housekeeping tasks live in `Batches`; anything else
/// (e.g. the stress-test utility task) uses `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Orders,
    Batches,
    Default,
}

impl Lane {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Orders => "orders",
            Lane::Batches => "batches",
            Lane::Default => "default",
        }
    }
}

/// Opaque task identifier, a UUID string — distinct from the `i64` entity
/// ids in `gsp-core` since tasks are a queue-internal concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy applied when a task is enqueued. `ack_late` and
/// `reject_on_worker_lost` are always `true` in this implementation — a
/// task is only considered complete once the worker that claimed it calls
/// back, and a worker that disappears mid-task puts its lease back up for
/// grabs.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub max_retries: i32,
    pub default_retry_delay_seconds: i64,
    pub ack_late: bool,
    pub reject_on_worker_lost: bool,
    pub hard_time_limit_seconds: i64,
    pub soft_time_limit_seconds: i64,
}

impl EnqueueOptions {
    #[must_use]
    pub fn for_order_task() -> Self {
        Self {
            max_retries: 3,
            default_retry_delay_seconds: 60,
            ack_late: true,
            reject_on_worker_lost: true,
            hard_time_limit_seconds: 600,
            soft_time_limit_seconds: 540,
        }
    }

    #[must_use]
    pub fn for_batch_task() -> Self {
        Self {
            max_retries: 1,
            default_retry_delay_seconds: 30,
            ack_late: true,
            reject_on_worker_lost: true,
            hard_time_limit_seconds: 3600,
            soft_time_limit_seconds: 3300,
        }
    }
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self::for_order_task()
    }
}

/// Arbitrary progress metadata reported mid-task, mirroring the driver's
/// step/percentage pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMeta {
    pub step: String,
    pub percent: u8,
    #[serde(default)]
    pub message: Option<String>,
}

/// A task pulled off a lane and locked for the caller, returned by
/// `WorkQueue::claim`. Must be resolved with `complete` or `fail`.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub task_id: TaskId,
    pub lane: Lane,
    pub task_name: String,
    pub args: serde_json::Value,
    pub num_errors: i32,
    pub max_retries: i32,
    pub default_retry_delay_seconds: i64,
    pub claimed_at: DateTime<Utc>,
}
