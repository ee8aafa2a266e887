//! In-memory `WorkQueue` fake for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::queue::WorkQueue;
use crate::types::{ClaimedTask, EnqueueOptions, Lane, ProgressMeta, TaskId};

const MAX_ERRORS: i32 = 10;

struct Entry {
    lane: Lane,
    task_name: String,
    args: serde_json::Value,
    max_retries: i32,
    default_retry_delay_seconds: i64,
    hard_time_limit_seconds: i64,
    num_errors: i32,
    live: bool,
    claimed: bool,
    lease_expires_at: Option<DateTime<Utc>>,
    try_at: DateTime<Utc>,
    progress: Option<ProgressMeta>,
    last_error: Option<String>,
}

#[derive(Default, Clone)]
pub struct MemoryQueue {
    tasks: std::sync::Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn backoff_delay(num_errors: i32) -> Duration {
        Duration::seconds(i64::from(num_errors).pow(4) + 3)
    }

    /// Test helper: inspect whether a task is still live (not dead, not
    /// completed/removed).
    pub fn is_live(&self, task_id: &TaskId) -> bool {
        self.tasks
            .lock()
            .get(&task_id.0)
            .map(|e| e.live)
            .unwrap_or(false)
    }

    /// Test helper: simulate a worker that crashed mid-task by backdating
    /// the lease so the next `claim` treats it as up for grabs again.
    pub fn force_expire_lease(&self, task_id: &TaskId) {
        if let Some(entry) = self.tasks.lock().get_mut(&task_id.0) {
            entry.lease_expires_at = Some(Utc::now() - Duration::seconds(1));
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(
        &self,
        lane: Lane,
        task_name: &str,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> QueueResult<TaskId> {
        let task_id = TaskId::new();
        self.tasks.lock().insert(
            task_id.0.clone(),
            Entry {
                lane,
                task_name: task_name.to_string(),
                args,
                max_retries: options.max_retries,
                default_retry_delay_seconds: options.default_retry_delay_seconds,
                hard_time_limit_seconds: options.hard_time_limit_seconds,
                num_errors: 0,
                live: true,
                claimed: false,
                lease_expires_at: None,
                try_at: Utc::now(),
                progress: None,
                last_error: None,
            },
        );
        Ok(task_id)
    }

    async fn revoke(&self, task_id: &TaskId, terminate: bool) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        if let Some(entry) = tasks.get_mut(&task_id.0) {
            if terminate || !entry.claimed {
                entry.live = false;
            }
        }
        Ok(())
    }

    async fn report_progress(&self, task_id: &TaskId, meta: ProgressMeta) -> QueueResult<()> {
        if let Some(entry) = self.tasks.lock().get_mut(&task_id.0) {
            entry.progress = Some(meta);
        }
        Ok(())
    }

    async fn retry(&self, task_id: &TaskId, countdown_seconds: i64) -> QueueResult<TaskId> {
        let mut tasks = self.tasks.lock();
        let entry = tasks
            .get_mut(&task_id.0)
            .ok_or_else(|| QueueError::TaskNotFound(task_id.0.clone()))?;
        entry.claimed = false;
        entry.lease_expires_at = None;
        entry.try_at = Utc::now() + Duration::seconds(countdown_seconds);
        Ok(task_id.clone())
    }

    async fn claim(&self, lane: Lane) -> QueueResult<Option<ClaimedTask>> {
        let mut tasks = self.tasks.lock();
        let now = Utc::now();
        let candidate = tasks
            .iter_mut()
            .filter(|(_, e)| {
                e.lane == lane
                    && e.live
                    && e.try_at <= now
                    && (!e.claimed || e.lease_expires_at.is_some_and(|exp| exp < now))
            })
            .min_by_key(|(_, e)| e.try_at);

        let Some((id, entry)) = candidate else {
            return Ok(None);
        };
        entry.claimed = true;
        entry.lease_expires_at = Some(now + Duration::seconds(entry.hard_time_limit_seconds));

        Ok(Some(ClaimedTask {
            task_id: TaskId(id.clone()),
            lane,
            task_name: entry.task_name.clone(),
            args: entry.args.clone(),
            num_errors: entry.num_errors,
            max_retries: entry.max_retries,
            default_retry_delay_seconds: entry.default_retry_delay_seconds,
            claimed_at: now,
        }))
    }

    async fn complete(&self, claimed: ClaimedTask) -> QueueResult<()> {
        self.tasks.lock().remove(&claimed.task_id.0);
        Ok(())
    }

    async fn fail(&self, claimed: ClaimedTask, error: &str, requeue: bool) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        let Some(entry) = tasks.get_mut(&claimed.task_id.0) else {
            return Ok(());
        };
        entry.num_errors += 1;
        entry.claimed = false;
        entry.lease_expires_at = None;
        entry.last_error = Some(error.to_string());

        if !requeue || entry.num_errors >= MAX_ERRORS {
            entry.live = false;
        } else {
            entry.try_at = now_plus(Self::backoff_delay(entry.num_errors));
        }
        Ok(())
    }

    async fn count(&self, lane: Lane) -> QueueResult<u64> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|e| e.lane == lane && e.live && !e.claimed)
            .count() as u64)
    }
}

fn now_plus(d: Duration) -> DateTime<Utc> {
    Utc::now() + d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_returns_none_when_lane_empty() {
        let queue = MemoryQueue::new();
        assert!(queue.claim(Lane::Orders).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_then_complete_removes_task() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let claimed = queue.claim(Lane::Orders).await.unwrap().unwrap();
        assert_eq!(claimed.task_id, id);
        assert!(queue.claim(Lane::Orders).await.unwrap().is_none(), "already claimed");
        queue.complete(claimed).await.unwrap();
        assert!(!queue.is_live(&id));
    }

    #[tokio::test]
    async fn fail_with_requeue_reschedules_into_the_future() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let claimed = queue.claim(Lane::Orders).await.unwrap().unwrap();
        queue.fail(claimed, "boom", true).await.unwrap();
        assert!(queue.is_live(&id));
        // Backoff delay means it should not be immediately claimable.
        assert!(queue.claim(Lane::Orders).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_without_requeue_kills_task() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let claimed = queue.claim(Lane::Orders).await.unwrap().unwrap();
        queue.fail(claimed, "fatal", false).await.unwrap();
        assert!(!queue.is_live(&id));
    }

    #[tokio::test]
    async fn claim_does_not_reclaim_a_live_lease() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let first = queue.claim(Lane::Orders).await.unwrap().unwrap();
        assert_eq!(first.task_id, id);
        assert!(queue.claim(Lane::Orders).await.unwrap().is_none(), "lease still live");
    }

    #[tokio::test]
    async fn claim_reclaims_a_task_whose_lease_expired() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        let first = queue.claim(Lane::Orders).await.unwrap().unwrap();
        assert_eq!(first.task_id, id);

        // Simulate the worker that claimed `first` being killed mid-task:
        // its lease lapses without `complete`/`fail` ever being called.
        queue.force_expire_lease(&id);

        let redelivered = queue
            .claim(Lane::Orders)
            .await
            .unwrap()
            .expect("an expired lease should be reclaimable");
        assert_eq!(redelivered.task_id, id);
        assert!(queue.is_live(&id));
    }

    #[tokio::test]
    async fn revoke_non_terminating_leaves_in_flight_claim_alone() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();
        queue.claim(Lane::Orders).await.unwrap();
        queue.revoke(&id, false).await.unwrap();
        assert!(queue.is_live(&id), "in-flight claim should survive a non-terminating revoke");
    }
}
