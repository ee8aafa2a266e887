//! Worker Task (C4): consumes one order id from the `orders` lane, loads
//! state from the Store, invokes the Browser Driver, writes back the
//! outcome, and triggers retries (spec.md §4.4).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use gsp_core::{LogLevel, OrderId, OrderPatch, OrderStatus, ProductStatus, StepLogEntry};
use gsp_driver::{Driver, OrderExecutor, ProductLine};
use gsp_queue::{ClaimedTask, Lane, ProgressMeta, TaskId, WorkQueue};
use gsp_store::Store;
use gsp_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::outcome::TaskOutcome;

/// Countdown applied to the single bounded retry given to an order that
/// failed for a reason outside the driver's own error handling (spec.md
/// §4.4 step 9).
const UNEXPECTED_ERROR_RETRY_COUNTDOWN_SECONDS: i64 = 60;

pub struct WorkerTask {
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
    executor: Arc<dyn OrderExecutor>,
    worker_id: String,
    default_retry_delay_seconds: i64,
}

impl WorkerTask {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn WorkQueue>,
        executor: Arc<dyn OrderExecutor>,
        worker_id: impl Into<String>,
        default_retry_delay_seconds: i64,
    ) -> Self {
        Self {
            store,
            queue,
            executor,
            worker_id: worker_id.into(),
            default_retry_delay_seconds,
        }
    }

    /// Claims and processes a single order task, resolving the claim
    /// against the queue. Intended to be called in a loop by the
    /// process's worker-pool runner; returns `Ok(None)` when the lane was
    /// empty.
    pub async fn run_once(&self) -> WorkerResult<Option<TaskOutcome>> {
        let Some(claimed) = self.queue.claim(Lane::Orders).await? else {
            return Ok(None);
        };
        let outcome = self.handle_claim(claimed).await?;
        Ok(Some(outcome))
    }

    async fn handle_claim(&self, claimed: ClaimedTask) -> WorkerResult<TaskOutcome> {
        let order_id = parse_order_id(&claimed.args)?;
        let task_id = claimed.task_id.clone();

        let result = AssertUnwindSafe(self.process_order(order_id, &task_id))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(outcome)) => {
                self.resolve_claim(claimed, &outcome).await?;
                Ok(outcome)
            }
            Ok(Err(err)) => {
                warn!(order_id = %order_id, error = %err, "worker task failed with a store/queue error");
                self.queue.fail(claimed, &err.to_string(), true).await?;
                Err(err)
            }
            Err(panic) => {
                let message = panic_message(&panic);
                warn!(order_id = %order_id, message = %message, "worker task panicked");
                let outcome = self.handle_unexpected_error(order_id, &message).await?;
                self.resolve_claim(claimed, &outcome).await?;
                Ok(outcome)
            }
        }
    }

    async fn resolve_claim(&self, claimed: ClaimedTask, outcome: &TaskOutcome) -> WorkerResult<()> {
        match outcome {
            TaskOutcome::NotFound | TaskOutcome::Redelivered | TaskOutcome::Completed => {
                self.queue.complete(claimed).await?;
            }
            TaskOutcome::ValidationFailed | TaskOutcome::Failed => {
                self.queue.fail(claimed, "order failed terminally", false).await?;
            }
            TaskOutcome::Retrying { countdown_seconds }
            | TaskOutcome::UnexpectedError { countdown_seconds } => {
                self.queue.retry(&claimed.task_id, *countdown_seconds).await?;
            }
        }
        Ok(())
    }

    /// Steps 1–9 of spec.md §4.4, operating entirely through the Store
    /// and Driver — no queue bookkeeping here, that belongs to the
    /// caller once the outcome is known.
    async fn process_order(&self, order_id: OrderId, task_id: &TaskId) -> WorkerResult<TaskOutcome> {
        // Step 1: load order.
        let Some(order) = self.store.get_order(order_id).await? else {
            return Ok(TaskOutcome::NotFound);
        };

        // Step 2: claim ownership via conditional transition.
        let patch = OrderPatch::new()
            .with_worker(self.worker_id.clone(), task_id.to_string())
            .with_started_now();
        let claimed_ownership = self
            .store
            .transition_order(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Queued, OrderStatus::Retrying],
                OrderStatus::InProgress,
                patch,
            )
            .await?;
        if !claimed_ownership {
            info!(order_id = %order_id, "redelivery of an already-owned order, ignoring");
            return Ok(TaskOutcome::Redelivered);
        }

        // Step 3: load products; empty ⇒ terminal validation failure.
        let products = self.store.get_order_products(order_id).await?;
        if products.is_empty() {
            let patch = OrderPatch::new()
                .with_error("validation", "order has no products")
                .with_finished_now();
            self.store
                .transition_order(order_id, &[OrderStatus::InProgress], OrderStatus::Failed, patch)
                .await?;
            self.store
                .append_log(
                    order_id,
                    StepLogEntry::new(LogLevel::Error, "validation", "order has no products"),
                )
                .await?;
            self.store.recompute_batch_counters(order.batch_id).await?;
            return Ok(TaskOutcome::ValidationFailed);
        }

        // Step 4: invoke the driver, forwarding progress to the queue.
        let product_lines: Vec<ProductLine> = products
            .iter()
            .map(|p| ProductLine {
                product_code: p.product_code.clone(),
                quantity: p.quantity,
            })
            .collect();

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(String, String)>();
        let on_progress: gsp_driver::ProgressCallback<'_> = Box::new(move |step, message| {
            let _ = progress_tx.send((step.to_string(), message.to_string()));
        });

        let queue_for_progress = Arc::clone(&self.queue);
        let progress_task_id = task_id.clone();
        let forward_progress = tokio::spawn(async move {
            let mut last_known = 0u8;
            while let Some((step, message)) = progress_rx.recv().await {
                last_known = Driver::progress_percent(&step, last_known);
                let meta = ProgressMeta {
                    step,
                    percent: last_known,
                    message: Some(message),
                };
                let _ = queue_for_progress.report_progress(&progress_task_id, meta).await;
            }
        });

        let result = self
            .executor
            .execute_order(&order.consultora_code, &product_lines, on_progress)
            .await;
        let _ = forward_progress.await;

        // Step 5: persist the accumulated step log, preserving order.
        for entry in &result.step_log {
            self.store.append_log(order_id, entry.clone()).await?;
        }

        // Step 6: update each product's outcome.
        for product in &products {
            if let Some(added) = result
                .products_added
                .iter()
                .find(|p| p.product_code == product.product_code)
            {
                let _ = added;
                self.store
                    .set_product_status(product.id, ProductStatus::Added, None)
                    .await?;
            } else if let Some(failed) = result
                .products_failed
                .iter()
                .find(|p| p.product_code == product.product_code)
            {
                self.store
                    .set_product_status(product.id, ProductStatus::Failed, Some(&failed.error))
                    .await?;
            }
            // else: leave `pending` — portal-level rejection is reported
            // via the audit log, not an add failure (spec.md §8 scenario 5).
        }

        // Steps 7–8: stamp duration/finished_at and branch on outcome.
        if result.success {
            let patch = OrderPatch::new()
                .with_duration(result.duration_seconds)
                .with_finished_now()
                .with_current_step("completed");
            self.store
                .transition_order(order_id, &[OrderStatus::InProgress], OrderStatus::Completed, patch)
                .await?;
            self.store.recompute_batch_counters(order.batch_id).await?;
            Metrics::order_finished("completed", result.duration_seconds);
            return Ok(TaskOutcome::Completed);
        }

        let error_step = result.error_step.clone().unwrap_or_else(|| "unknown".into());
        let error_message = result.error.clone().unwrap_or_else(|| "unknown error".into());
        Metrics::driver_step_error(&error_step);

        if order.can_retry_automatically() {
            self.store.bump_retry(order_id).await?;
            let patch = OrderPatch::new()
                .with_error(error_step, error_message)
                .with_duration(result.duration_seconds)
                .with_screenshot(
                    result
                        .screenshot_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                );
            self.store
                .transition_order(order_id, &[OrderStatus::InProgress], OrderStatus::Retrying, patch)
                .await?;
            let countdown = self.default_retry_delay_seconds * i64::from(order.retry_count + 1);
            Metrics::order_retried("automatic");
            return Ok(TaskOutcome::Retrying {
                countdown_seconds: countdown,
            });
        }

        let patch = OrderPatch::new()
            .with_error(error_step, error_message)
            .with_duration(result.duration_seconds)
            .with_finished_now()
            .with_screenshot(
                result
                    .screenshot_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            );
        self.store
            .transition_order(order_id, &[OrderStatus::InProgress], OrderStatus::Failed, patch)
            .await?;
        self.store.recompute_batch_counters(order.batch_id).await?;
        Metrics::order_finished("failed", result.duration_seconds);
        Ok(TaskOutcome::Failed)
    }

    /// Step 9: handler for anything unexpected (panics, bugs) that
    /// escapes the driver's own error handling.
    async fn handle_unexpected_error(
        &self,
        order_id: OrderId,
        message: &str,
    ) -> WorkerResult<TaskOutcome> {
        let patch = OrderPatch::new()
            .with_error("unexpected_error", message)
            .with_finished_now();
        self.store
            .transition_order(
                order_id,
                &[OrderStatus::InProgress, OrderStatus::Pending, OrderStatus::Queued, OrderStatus::Retrying],
                OrderStatus::Failed,
                patch,
            )
            .await?;
        if let Some(order) = self.store.get_order(order_id).await? {
            self.store.recompute_batch_counters(order.batch_id).await?;
        }
        Ok(TaskOutcome::UnexpectedError {
            countdown_seconds: UNEXPECTED_ERROR_RETRY_COUNTDOWN_SECONDS,
        })
    }
}

fn parse_order_id(args: &serde_json::Value) -> WorkerResult<OrderId> {
    args.get("order_id")
        .and_then(serde_json::Value::as_i64)
        .map(OrderId::new)
        .ok_or_else(|| WorkerError::MalformedArgs("missing integer `order_id`".into()))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_id_from_task_args() {
        let args = serde_json::json!({ "order_id": 42 });
        assert_eq!(parse_order_id(&args).unwrap(), OrderId::new(42));
    }

    #[test]
    fn rejects_missing_order_id() {
        let args = serde_json::json!({ "batch_id": 1 });
        assert!(parse_order_id(&args).is_err());
    }
}
