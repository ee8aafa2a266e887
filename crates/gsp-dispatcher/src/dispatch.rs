//! Batch Dispatcher (C5): fans a batch's eligible orders out to the
//! `orders` lane (spec.md §4.5).

use std::sync::Arc;

use gsp_core::{BatchId, BatchStatus, OrderPatch, OrderStatus};
use gsp_queue::{EnqueueOptions, Lane, WorkQueue};
use gsp_store::Store;
use gsp_telemetry::Metrics;
use tracing::{error, info, warn};

use crate::error::{DispatcherError, DispatcherResult};

/// Returned once every eligible order has been enqueued (or found to have
/// raced with some other writer and skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub batch_id: BatchId,
    pub dispatched: usize,
}

pub struct BatchDispatcher {
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn WorkQueue>) -> Self {
        Self { store, queue }
    }

    /// Marks the batch running and enqueues every `pending`/`retrying`
    /// order into the `orders` lane. On any error partway through, the
    /// batch is transitioned to `failed` before the error is returned —
    /// orders already enqueued are left as is; the worker will still pick
    /// them up independent of the batch's own status.
    pub async fn dispatch(&self, batch_id: BatchId) -> DispatcherResult<DispatchSummary> {
        match self.try_dispatch(batch_id).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(batch_id = %batch_id, error = %err, "batch dispatch failed, marking batch failed");
                if let Err(set_err) = self
                    .store
                    .set_batch_status(batch_id, BatchStatus::Failed, false, true)
                    .await
                {
                    warn!(batch_id = %batch_id, error = %set_err, "failed to mark batch failed after dispatch error");
                }
                Err(err)
            }
        }
    }

    async fn try_dispatch(&self, batch_id: BatchId) -> DispatcherResult<DispatchSummary> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(DispatcherError::BatchNotFound(batch_id))?;

        self.store
            .set_batch_status(batch_id, BatchStatus::Running, batch.started_at.is_none(), false)
            .await?;

        let eligible = self
            .store
            .get_batch_orders(batch_id, None)
            .await?
            .into_iter()
            .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Retrying));

        let mut dispatched = 0usize;
        for order in eligible {
            let from_status = order.status;
            let claimed = self
                .store
                .transition_order(
                    order.id,
                    &[from_status],
                    OrderStatus::Queued,
                    OrderPatch::new().with_task_id(None),
                )
                .await?;
            if !claimed {
                // Raced with a pause/cancel or another dispatch; leave it.
                continue;
            }

            let task_id = self
                .queue
                .enqueue(
                    Lane::Orders,
                    "process_order",
                    serde_json::json!({ "order_id": order.id.get() }),
                    EnqueueOptions::for_order_task(),
                )
                .await?;

            // Enqueue-then-store: a worker may claim and finish the task
            // before this write lands. That is fine — the worker
            // rediscovers its own ownership via `transition_order`, it
            // never depends on `task_id` being populated yet.
            self.store
                .transition_order(
                    order.id,
                    &[OrderStatus::Queued],
                    OrderStatus::Queued,
                    OrderPatch::new().with_task_id(Some(task_id.to_string())),
                )
                .await?;

            dispatched += 1;
            Metrics::order_dispatched(&batch_id.to_string());
        }

        info!(batch_id = %batch_id, dispatched, "batch dispatched");
        Ok(DispatchSummary { batch_id, dispatched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsp_queue::MemoryQueue;
    use gsp_store::{MemoryStore, NewOrder, NewProduct};

    async fn seeded_batch(store: &MemoryStore, n: usize) -> BatchId {
        let orders = (0..n)
            .map(|i| NewOrder {
                consultora_code: format!("C{i:03}"),
                consultora_name: None,
                max_retries: 3,
                products: vec![NewProduct {
                    product_code: "P1".into(),
                    quantity: 1,
                }],
            })
            .collect();
        store
            .create_batch("test batch", None, None, orders)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn dispatches_every_pending_order_into_the_orders_lane() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let batch_id = seeded_batch(&store, 3).await;

        let dispatcher = BatchDispatcher::new(store.clone(), queue.clone());
        let summary = dispatcher.dispatch(batch_id).await.unwrap();
        assert_eq!(summary.dispatched, 3);

        assert_eq!(queue.count(Lane::Orders).await.unwrap(), 3);

        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Running);
        assert!(batch.started_at.is_some());

        let orders = store.get_batch_orders(batch_id, None).await.unwrap();
        assert!(orders.iter().all(|o| o.status == OrderStatus::Queued));
        assert!(orders.iter().all(|o| o.task_id.is_some()));
    }

    #[tokio::test]
    async fn dispatch_of_unknown_batch_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let dispatcher = BatchDispatcher::new(store, queue);
        let err = dispatcher.dispatch(BatchId::new(999)).await.unwrap_err();
        assert!(matches!(err, DispatcherError::BatchNotFound(_)));
    }
}
