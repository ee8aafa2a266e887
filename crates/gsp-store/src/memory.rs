//! In-memory `Store` fake used by integration tests across the workspace
//! so the concurrency invariants can be exercised without a live Postgres
//! instance.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use gsp_core::{
    Batch, BatchId, BatchStats, BatchStatus, Order, OrderId, OrderLog, OrderLogId, OrderPatch,
    OrderProduct, OrderProductId, OrderStatus, ProductStatus, StepLogEntry,
};
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::{NewOrder, Store};

#[derive(Default)]
struct Inner {
    batches: HashMap<i64, Batch>,
    orders: HashMap<i64, Order>,
    products: HashMap<i64, OrderProduct>,
    logs: HashMap<i64, OrderLog>,
    next_batch_id: i64,
    next_order_id: i64,
    next_product_id: i64,
    next_log_id: i64,
}

/// An entirely in-process `Store`, suitable for unit and integration
/// tests. Not shared across OS processes.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_batch(
        &self,
        name: &str,
        description: Option<&str>,
        source_file: Option<&str>,
        orders: Vec<NewOrder>,
    ) -> StoreResult<BatchId> {
        let mut inner = self.inner.lock();
        inner.next_batch_id += 1;
        let batch_id = inner.next_batch_id;
        let now = Utc::now();

        inner.batches.insert(
            batch_id,
            Batch {
                id: BatchId::new(batch_id),
                name: name.to_string(),
                description: description.map(str::to_string),
                status: BatchStatus::Pending,
                total_orders: orders.len() as i32,
                completed_orders: 0,
                failed_orders: 0,
                source_file: source_file.map(str::to_string),
                created_at: now,
                updated_at: now,
                started_at: None,
                finished_at: None,
            },
        );

        for order in orders {
            inner.next_order_id += 1;
            let order_id = inner.next_order_id;
            inner.orders.insert(
                order_id,
                Order {
                    id: OrderId::new(order_id),
                    batch_id: BatchId::new(batch_id),
                    consultora_code: order.consultora_code,
                    consultora_name: order.consultora_name,
                    status: OrderStatus::Pending,
                    current_step: None,
                    retry_count: 0,
                    max_retries: order.max_retries,
                    task_id: None,
                    worker_id: None,
                    error_message: None,
                    error_step: None,
                    screenshot_path: None,
                    duration_seconds: None,
                    created_at: now,
                    updated_at: now,
                    started_at: None,
                    finished_at: None,
                },
            );

            for product in order.products {
                gsp_core::OrderProduct::validate_quantity(product.quantity)?;
                inner.next_product_id += 1;
                let product_id = inner.next_product_id;
                inner.products.insert(
                    product_id,
                    OrderProduct {
                        id: OrderProductId::new(product_id),
                        order_id: OrderId::new(order_id),
                        product_code: product.product_code,
                        quantity: product.quantity,
                        status: ProductStatus::Pending,
                        error_message: None,
                        added_at: None,
                    },
                );
            }
        }

        Ok(BatchId::new(batch_id))
    }

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<Batch>> {
        Ok(self.inner.lock().batches.get(&batch_id.get()).cloned())
    }

    async fn list_batches(&self) -> StoreResult<Vec<Batch>> {
        let mut batches: Vec<Batch> = self.inner.lock().batches.values().cloned().collect();
        batches.sort_by_key(|b| std::cmp::Reverse(b.id.get()));
        Ok(batches)
    }

    async fn get_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.inner.lock().orders.get(&order_id.get()).cloned())
    }

    async fn get_batch_orders(
        &self,
        batch_id: BatchId,
        status_filter: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let inner = self.inner.lock();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.batch_id == batch_id)
            .filter(|o| status_filter.map(|s| o.status == s).unwrap_or(true))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id.get());
        Ok(orders)
    }

    async fn get_order_logs(&self, order_id: OrderId) -> StoreResult<Vec<OrderLog>> {
        let inner = self.inner.lock();
        let mut logs: Vec<OrderLog> = inner
            .logs
            .values()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.id.get());
        Ok(logs)
    }

    async fn get_order_products(&self, order_id: OrderId) -> StoreResult<Vec<OrderProduct>> {
        let inner = self.inner.lock();
        let mut products: Vec<OrderProduct> = inner
            .products
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id.get());
        Ok(products)
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let Some(order) = inner.orders.get_mut(&order_id.get()) else {
            return Ok(false);
        };
        if !from.contains(&order.status) {
            return Ok(false);
        }

        order.status = to;
        if let Some(v) = patch.current_step {
            order.current_step = v;
        }
        if let Some(v) = patch.task_id {
            order.task_id = v;
        }
        if let Some(v) = patch.worker_id {
            order.worker_id = v;
        }
        if let Some(v) = patch.error_message {
            order.error_message = v;
        }
        if let Some(v) = patch.error_step {
            order.error_step = v;
        }
        if let Some(v) = patch.screenshot_path {
            order.screenshot_path = v;
        }
        if let Some(v) = patch.duration_seconds {
            order.duration_seconds = v;
        }
        if let Some(v) = patch.started_at {
            order.started_at = v;
        }
        if let Some(v) = patch.finished_at {
            order.finished_at = v;
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn bump_retry(&self, order_id: OrderId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(order) = inner.orders.get_mut(&order_id.get()) {
            order.retry_count += 1;
            order.error_message = None;
            order.error_step = None;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_product_status(
        &self,
        order_product_id: OrderProductId,
        status: ProductStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(product) = inner.products.get_mut(&order_product_id.get()) {
            product.status = status;
            product.error_message = error_message.map(str::to_string);
            if status == ProductStatus::Added {
                product.added_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn append_log(&self, order_id: OrderId, entry: StepLogEntry) -> StoreResult<OrderLogId> {
        let mut inner = self.inner.lock();
        inner.next_log_id += 1;
        let log_id = inner.next_log_id;
        inner.logs.insert(
            log_id,
            OrderLog {
                id: OrderLogId::new(log_id),
                order_id,
                level: entry.level,
                step: entry.step,
                message: entry.message,
                details: entry.details,
                screenshot_path: entry.screenshot_path,
                timestamp: entry.timestamp,
            },
        );
        Ok(OrderLogId::new(log_id))
    }

    async fn recompute_batch_counters(&self, batch_id: BatchId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let completed = inner
            .orders
            .values()
            .filter(|o| o.batch_id == batch_id && o.status == OrderStatus::Completed)
            .count() as i32;
        let failed = inner
            .orders
            .values()
            .filter(|o| o.batch_id == batch_id && o.status == OrderStatus::Failed)
            .count() as i32;
        let total = inner
            .orders
            .values()
            .filter(|o| o.batch_id == batch_id)
            .count() as i32;

        let Some(batch) = inner.batches.get_mut(&batch_id.get()) else {
            return Err(StoreError::BatchNotFound(batch_id));
        };
        batch.completed_orders = completed;
        batch.failed_orders = failed;
        batch.updated_at = Utc::now();
        if completed + failed >= total {
            batch.status = if failed > 0 {
                BatchStatus::Failed
            } else {
                BatchStatus::Completed
            };
            batch.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn batch_stats(&self, batch_id: BatchId) -> StoreResult<BatchStats> {
        let inner = self.inner.lock();
        let orders: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| o.batch_id == batch_id)
            .collect();

        let count = |s: OrderStatus| orders.iter().filter(|o| o.status == s).count() as i32;
        let total = orders.len() as i32;
        let completed = count(OrderStatus::Completed);
        let failed = count(OrderStatus::Failed);
        let cancelled = count(OrderStatus::Cancelled);

        let durations: Vec<f64> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed || o.status == OrderStatus::Failed)
            .filter_map(|o| o.duration_seconds)
            .collect();
        let mean_duration_seconds = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        let terminal = completed + failed + cancelled;
        let progress_percent = if total == 0 {
            0.0
        } else {
            (terminal as f64 / total as f64) * 100.0
        };
        let eta_seconds = mean_duration_seconds.map(|mean| mean * (total - terminal) as f64);

        Ok(BatchStats {
            batch_id,
            total_orders: total,
            pending: count(OrderStatus::Pending),
            queued: count(OrderStatus::Queued),
            in_progress: count(OrderStatus::InProgress),
            retrying: count(OrderStatus::Retrying),
            completed,
            failed,
            cancelled,
            progress_percent,
            mean_duration_seconds,
            eta_seconds,
        })
    }

    async fn set_batch_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
        stamp_started: bool,
        stamp_finished: bool,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(batch) = inner.batches.get_mut(&batch_id.get()) {
            batch.status = status;
            if stamp_started && batch.started_at.is_none() {
                batch.started_at = Some(Utc::now());
            }
            if stamp_finished {
                batch.finished_at = Some(Utc::now());
            }
            batch.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn active_worker_count(&self) -> StoreResult<i64> {
        let inner = self.inner.lock();
        let mut workers: Vec<&String> = inner
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::InProgress)
            .filter_map(|o| o.worker_id.as_ref())
            .collect();
        workers.sort();
        workers.dedup();
        Ok(workers.len() as i64)
    }

    async fn total_batch_count(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().batches.len() as i64)
    }

    async fn total_order_count(&self) -> StoreResult<i64> {
        Ok(self.inner.lock().orders.len() as i64)
    }

    async fn orders_by_status_counts(&self) -> StoreResult<Vec<(OrderStatus, i64)>> {
        let inner = self.inner.lock();
        let statuses = [
            OrderStatus::Pending,
            OrderStatus::Queued,
            OrderStatus::InProgress,
            OrderStatus::Retrying,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ];
        Ok(statuses
            .into_iter()
            .map(|s| {
                let n = inner.orders.values().filter(|o| o.status == s).count() as i64;
                (s, n)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewProduct;

    fn sample_order() -> NewOrder {
        NewOrder {
            consultora_code: "C001".into(),
            consultora_name: None,
            max_retries: 3,
            products: vec![NewProduct {
                product_code: "P1".into(),
                quantity: 2,
            }],
        }
    }

    #[tokio::test]
    async fn create_batch_sets_total_orders() {
        let store = MemoryStore::new();
        let batch_id = store
            .create_batch("b1", None, None, vec![sample_order(), sample_order()])
            .await
            .unwrap();
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.total_orders, 2);
        assert_eq!(batch.status, BatchStatus::Pending);
    }

    #[tokio::test]
    async fn transition_order_respects_precondition() {
        let store = MemoryStore::new();
        let batch_id = store
            .create_batch("b1", None, None, vec![sample_order()])
            .await
            .unwrap();
        let orders = store.get_batch_orders(batch_id, None).await.unwrap();
        let order_id = orders[0].id;

        let ok = store
            .transition_order(
                order_id,
                &[OrderStatus::Pending],
                OrderStatus::Queued,
                OrderPatch::new(),
            )
            .await
            .unwrap();
        assert!(ok);

        // Re-applying the same precondition now fails: status is Queued.
        let ok2 = store
            .transition_order(
                order_id,
                &[OrderStatus::Pending],
                OrderStatus::Queued,
                OrderPatch::new(),
            )
            .await
            .unwrap();
        assert!(!ok2);
    }

    #[tokio::test]
    async fn recompute_batch_counters_finalizes_completed() {
        let store = MemoryStore::new();
        let batch_id = store
            .create_batch("b1", None, None, vec![sample_order()])
            .await
            .unwrap();
        let orders = store.get_batch_orders(batch_id, None).await.unwrap();
        store
            .transition_order(
                orders[0].id,
                &[OrderStatus::Pending],
                OrderStatus::Completed,
                OrderPatch::new(),
            )
            .await
            .unwrap();
        store.recompute_batch_counters(batch_id).await.unwrap();
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.completed_orders, 1);
        assert!(batch.finished_at.is_some());
    }

    #[tokio::test]
    async fn recompute_batch_counters_finalizes_failed_when_any_order_failed() {
        let store = MemoryStore::new();
        let batch_id = store
            .create_batch("b1", None, None, vec![sample_order(), sample_order()])
            .await
            .unwrap();
        let orders = store.get_batch_orders(batch_id, None).await.unwrap();
        store
            .transition_order(
                orders[0].id,
                &[OrderStatus::Pending],
                OrderStatus::Completed,
                OrderPatch::new(),
            )
            .await
            .unwrap();
        store
            .transition_order(
                orders[1].id,
                &[OrderStatus::Pending],
                OrderStatus::Failed,
                OrderPatch::new(),
            )
            .await
            .unwrap();
        store.recompute_batch_counters(batch_id).await.unwrap();
        let batch = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
    }
}
