//! The `Store` trait: durable persistence for batches, orders, products
//! and the per-order audit trail (component C1).

use async_trait::async_trait;
use gsp_core::{
    Batch, BatchId, BatchStats, Order, OrderId, OrderLog, OrderLogId, OrderPatch, OrderStatus,
    StepLogEntry,
};

use crate::error::StoreResult;

/// One product line supplied when creating a batch, before an id has been
/// assigned.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub product_code: String,
    pub quantity: i32,
}

/// One order supplied when creating a batch, before an id has been
/// assigned.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub consultora_code: String,
    pub consultora_name: Option<String>,
    pub max_retries: i32,
    pub products: Vec<NewProduct>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically insert a batch, its orders and their products, setting
    /// `total_orders` from `orders.len()`.
    async fn create_batch(
        &self,
        name: &str,
        description: Option<&str>,
        source_file: Option<&str>,
        orders: Vec<NewOrder>,
    ) -> StoreResult<BatchId>;

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<Batch>>;

    async fn list_batches(&self) -> StoreResult<Vec<Batch>>;

    async fn get_order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    async fn get_batch_orders(
        &self,
        batch_id: BatchId,
        status_filter: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;

    async fn get_order_logs(&self, order_id: OrderId) -> StoreResult<Vec<OrderLog>>;

    async fn get_order_products(
        &self,
        order_id: OrderId,
    ) -> StoreResult<Vec<gsp_core::OrderProduct>>;

    /// Conditional `UPDATE ... WHERE status = ANY(from) RETURNING`. Returns
    /// `true` iff the precondition matched and the row updated. This is the
    /// single-writer linearization point for order state.
    async fn transition_order(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> StoreResult<bool>;

    /// Atomically increments `retry_count` and clears error fields,
    /// independent of any status transition.
    async fn bump_retry(&self, order_id: OrderId) -> StoreResult<()>;

    /// Mark a product line's outcome after the driver returns.
    async fn set_product_status(
        &self,
        order_product_id: gsp_core::OrderProductId,
        status: gsp_core::ProductStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()>;

    async fn append_log(&self, order_id: OrderId, entry: StepLogEntry) -> StoreResult<OrderLogId>;

    /// Recompute `completed_orders`/`failed_orders` from the child order
    /// rows and finalize the batch's terminal status/`finished_at` if every
    /// order has reached a terminal state. Idempotent; takes a row lock on
    /// the batch for the duration.
    async fn recompute_batch_counters(&self, batch_id: BatchId) -> StoreResult<()>;

    async fn batch_stats(&self, batch_id: BatchId) -> StoreResult<BatchStats>;

    /// Set a batch's status directly (used by pause/cancel/start, which do
    /// not need the conditional-transition semantics `transition_order`
    /// provides since only the Orchestrator mutates batch status).
    async fn set_batch_status(
        &self,
        batch_id: BatchId,
        status: gsp_core::BatchStatus,
        stamp_started: bool,
        stamp_finished: bool,
    ) -> StoreResult<()>;

    /// Count orders with a status currently marked `in_progress`, grouped
    /// by distinct `worker_id` — used by `system_stats` as a substitute for
    /// a broker-side worker inspector.
    async fn active_worker_count(&self) -> StoreResult<i64>;

    async fn total_batch_count(&self) -> StoreResult<i64>;

    async fn total_order_count(&self) -> StoreResult<i64>;

    async fn orders_by_status_counts(&self) -> StoreResult<Vec<(OrderStatus, i64)>>;
}
