//! Orchestrator (C6): in-process façade with no mutable state of its
//! own — every call opens a scoped store session and, where the batch's
//! eligible orders need to move, defers to the queue or the dispatcher
//! (spec.md §4.6).

use std::sync::Arc;

use gsp_core::{BatchId, BatchStats, BatchStatus, OrderId, OrderPatch, OrderStatus};
use gsp_queue::{EnqueueOptions, Lane, TaskId, WorkQueue};
use gsp_store::Store;
use tracing::info;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::stats::SystemStats;

pub struct Orchestrator {
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn WorkQueue>) -> Self {
        Self { store, queue }
    }

    /// Marks the batch `running` and enqueues a dispatcher task; the
    /// actual fan-out happens wherever that task is claimed (C5).
    pub async fn start_batch(&self, batch_id: BatchId) -> OrchestratorResult<TaskId> {
        let batch = self.require_batch(batch_id).await?;
        if !batch.status.is_startable() {
            return Err(OrchestratorError::BatchNotStartable(batch_id));
        }

        self.store
            .set_batch_status(batch_id, BatchStatus::Running, batch.started_at.is_none(), false)
            .await?;

        let task_id = self
            .queue
            .enqueue(
                Lane::Batches,
                "dispatch_batch",
                serde_json::json!({ "batch_id": batch_id.get() }),
                EnqueueOptions::for_batch_task(),
            )
            .await?;
        info!(batch_id = %batch_id, task_id = %task_id, "batch start requested");
        Ok(task_id)
    }

    /// Sets the batch `paused`, revokes (non-terminating) any
    /// `pending`/`queued` orders, and resets them back to `pending` so a
    /// later `start_batch` picks them up again.
    pub async fn pause_batch(&self, batch_id: BatchId) -> OrchestratorResult<()> {
        self.require_batch(batch_id).await?;
        self.store
            .set_batch_status(batch_id, BatchStatus::Paused, false, false)
            .await?;

        let orders = self.store.get_batch_orders(batch_id, None).await?;
        for order in orders
            .into_iter()
            .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Queued))
        {
            if let Some(task_id) = order.task_id.as_ref().map(|s| TaskId(s.clone())) {
                self.queue.revoke(&task_id, false).await?;
            }
            self.store
                .transition_order(
                    order.id,
                    &[order.status],
                    OrderStatus::Pending,
                    OrderPatch::new().with_task_id(None),
                )
                .await?;
        }
        info!(batch_id = %batch_id, "batch paused");
        Ok(())
    }

    /// Sets the batch `cancelled`, terminating any
    /// `pending`/`queued`/`retrying` orders outright. In-progress orders
    /// finish naturally — no cooperative cancellation inside the driver.
    pub async fn cancel_batch(&self, batch_id: BatchId) -> OrchestratorResult<()> {
        self.require_batch(batch_id).await?;
        self.store
            .set_batch_status(batch_id, BatchStatus::Cancelled, false, true)
            .await?;

        let orders = self.store.get_batch_orders(batch_id, None).await?;
        for order in orders.into_iter().filter(|o| {
            matches!(
                o.status,
                OrderStatus::Pending | OrderStatus::Queued | OrderStatus::Retrying
            )
        }) {
            if let Some(task_id) = order.task_id.as_ref().map(|s| TaskId(s.clone())) {
                self.queue.revoke(&task_id, true).await?;
            }
            self.store
                .transition_order(
                    order.id,
                    &[order.status],
                    OrderStatus::Cancelled,
                    OrderPatch::new().with_finished_now(),
                )
                .await?;
        }
        info!(batch_id = %batch_id, "batch cancelled");
        Ok(())
    }

    /// Re-queues every `failed` order still within its manual retry
    /// ceiling (`max_retries + 2`), then enqueues a dispatcher task so
    /// they are picked back up.
    pub async fn retry_batch_failures(&self, batch_id: BatchId) -> OrchestratorResult<TaskId> {
        self.require_batch(batch_id).await?;
        let orders = self.store.get_batch_orders(batch_id, None).await?;
        for order in orders
            .iter()
            .filter(|o| o.status == OrderStatus::Failed && o.can_retry_manually())
        {
            self.store.bump_retry(order.id).await?;
            self.store
                .transition_order(
                    order.id,
                    &[OrderStatus::Failed],
                    OrderStatus::Retrying,
                    OrderPatch::new().with_task_id(None).clearing_error(),
                )
                .await?;
        }

        let task_id = self
            .queue
            .enqueue(
                Lane::Batches,
                "dispatch_batch",
                serde_json::json!({ "batch_id": batch_id.get() }),
                EnqueueOptions::for_batch_task(),
            )
            .await?;
        info!(batch_id = %batch_id, task_id = %task_id, "batch failures re-queued");
        Ok(task_id)
    }

    /// Bumps `retry_count`, clears error fields, transitions the order
    /// to `retrying`, and enqueues it directly into `orders`.
    pub async fn retry_single_order(&self, order_id: OrderId) -> OrchestratorResult<TaskId> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))?;
        if !matches!(order.status, OrderStatus::Failed | OrderStatus::Cancelled) {
            return Err(OrchestratorError::OrderNotRetriable(order_id));
        }
        if !order.can_retry_manually() {
            return Err(OrchestratorError::OrderNotRetriable(order_id));
        }

        self.store.bump_retry(order_id).await?;
        self.store
            .transition_order(
                order_id,
                &[order.status],
                OrderStatus::Retrying,
                OrderPatch::new().with_task_id(None).clearing_error(),
            )
            .await?;

        let task_id = self
            .queue
            .enqueue(
                Lane::Orders,
                "process_order",
                serde_json::json!({ "order_id": order_id.get() }),
                EnqueueOptions::for_order_task(),
            )
            .await?;
        self.store
            .transition_order(
                order_id,
                &[OrderStatus::Retrying],
                OrderStatus::Retrying,
                OrderPatch::new().with_task_id(Some(task_id.to_string())),
            )
            .await?;
        info!(order_id = %order_id, task_id = %task_id, "single order retry requested");
        Ok(task_id)
    }

    pub async fn batch_stats(&self, batch_id: BatchId) -> OrchestratorResult<BatchStats> {
        self.require_batch(batch_id).await?;
        Ok(self.store.batch_stats(batch_id).await?)
    }

    pub async fn system_stats(&self) -> OrchestratorResult<SystemStats> {
        Ok(SystemStats {
            active_workers: self.store.active_worker_count().await?,
            total_batches: self.store.total_batch_count().await?,
            total_orders: self.store.total_order_count().await?,
            orders_by_status: self.store.orders_by_status_counts().await?,
        })
    }

    async fn require_batch(&self, batch_id: BatchId) -> OrchestratorResult<gsp_core::Batch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or(OrchestratorError::BatchNotFound(batch_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsp_queue::MemoryQueue;
    use gsp_store::{MemoryStore, NewOrder, NewProduct};

    fn single_order() -> NewOrder {
        NewOrder {
            consultora_code: "C001".into(),
            consultora_name: None,
            max_retries: 3,
            products: vec![NewProduct {
                product_code: "P1".into(),
                quantity: 1,
            }],
        }
    }

    #[tokio::test]
    async fn start_batch_rejects_non_startable_state() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(store.clone(), queue);
        let batch_id = store
            .create_batch("b", None, None, vec![single_order()])
            .await
            .unwrap();
        store
            .set_batch_status(batch_id, BatchStatus::Running, true, false)
            .await
            .unwrap();

        let err = orchestrator.start_batch(batch_id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::BatchNotStartable(_)));
    }

    #[tokio::test]
    async fn start_batch_marks_running_and_enqueues_dispatch_task() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(store.clone(), queue.clone());
        let batch_id = store
            .create_batch("b", None, None, vec![single_order()])
            .await
            .unwrap();

        orchestrator.start_batch(batch_id).await.unwrap();

        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Running);
        assert_eq!(queue.count(Lane::Batches).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pause_resets_pending_and_queued_orders() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(store.clone(), queue.clone());
        let batch_id = store
            .create_batch("b", None, None, vec![single_order()])
            .await
            .unwrap();
        let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;
        store
            .transition_order(order_id, &[OrderStatus::Pending], OrderStatus::Queued, OrderPatch::new())
            .await
            .unwrap();

        orchestrator.pause_batch(batch_id).await.unwrap();

        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Paused);
        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn retry_single_order_requires_failed_or_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(store.clone(), queue);
        let batch_id = store
            .create_batch("b", None, None, vec![single_order()])
            .await
            .unwrap();
        let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;

        let err = orchestrator.retry_single_order(order_id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::OrderNotRetriable(_)));
    }

    #[tokio::test]
    async fn retry_single_order_requeues_a_failed_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(store.clone(), queue.clone());
        let batch_id = store
            .create_batch("b", None, None, vec![single_order()])
            .await
            .unwrap();
        let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;
        store
            .transition_order(order_id, &[OrderStatus::Pending], OrderStatus::Failed, OrderPatch::new())
            .await
            .unwrap();

        let task_id = orchestrator.retry_single_order(order_id).await.unwrap();
        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Retrying);
        assert_eq!(order.retry_count, 1);
        assert_eq!(order.task_id, Some(task_id.to_string()));
        assert_eq!(queue.count(Lane::Orders).await.unwrap(), 1);
    }
}
