//! The `WorkQueue` trait: durable task delivery with claim/complete/fail
//! lifecycle, ack-late semantics and linear retry backoff (component C2).

use async_trait::async_trait;

use crate::error::QueueResult;
use crate::types::{ClaimedTask, EnqueueOptions, Lane, ProgressMeta, TaskId};

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(
        &self,
        lane: Lane,
        task_name: &str,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> QueueResult<TaskId>;

    /// Best-effort revocation. `terminate = false` only guarantees the task
    /// will not be claimed if still pending; `terminate = true` additionally
    /// marks an in-flight claim as revoked so its worker can observe it
    /// cooperatively — it cannot interrupt a blocking browser call.
    async fn revoke(&self, task_id: &TaskId, terminate: bool) -> QueueResult<()>;

    async fn report_progress(&self, task_id: &TaskId, meta: ProgressMeta) -> QueueResult<()>;

    /// Explicit cooperative retry with a caller-chosen countdown, used by
    /// the worker task after a retriable failure (linear backoff:
    /// `default_retry_delay * retry_count`).
    async fn retry(&self, task_id: &TaskId, countdown_seconds: i64) -> QueueResult<TaskId>;

    /// Pull and lock the next eligible task in a lane (`try_at <= now`,
    /// not already claimed). Workers run at effective prefetch = 1: a
    /// single call returns at most one task.
    async fn claim(&self, lane: Lane) -> QueueResult<Option<ClaimedTask>>;

    async fn complete(&self, claimed: ClaimedTask) -> QueueResult<()>;

    /// Record a failure. `requeue = true` schedules another attempt with
    /// exponential backoff (`num_errors^4 + 3` seconds, matching the
    /// at-least-once job-table pattern this queue is modeled on);
    /// `requeue = false` marks the task dead.
    async fn fail(&self, claimed: ClaimedTask, error: &str, requeue: bool) -> QueueResult<()>;

    async fn count(&self, lane: Lane) -> QueueResult<u64>;
}
