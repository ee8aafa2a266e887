//! Exercises `WorkerTask` end to end against the in-memory `Store`/`WorkQueue`
//! fakes and a canned `OrderExecutor`, without ever launching a browser.

use std::sync::Arc;

use async_trait::async_trait;
use gsp_core::{BatchStatus, OrderStatus};
use gsp_driver::{OrderExecutor, OrderResult, ProductAdded, ProductFailed, ProductLine, ProgressCallback};
use gsp_queue::{EnqueueOptions, Lane, MemoryQueue, WorkQueue};
use gsp_store::{MemoryStore, NewOrder, NewProduct, Store};
use gsp_worker::{TaskOutcome, WorkerTask};

/// Always returns the `OrderResult` it was built with, ignoring the inputs.
struct FakeExecutor {
    result: OrderResult,
}

#[async_trait]
impl OrderExecutor for FakeExecutor {
    async fn execute_order(
        &self,
        _consultora_code: &str,
        _products: &[ProductLine],
        on_progress: ProgressCallback<'_>,
    ) -> OrderResult {
        on_progress("login", "signed in");
        on_progress("completed", "done");
        self.result.clone()
    }
}

fn success_result() -> OrderResult {
    OrderResult {
        success: true,
        error: None,
        error_step: None,
        screenshot_path: None,
        duration_seconds: 12.5,
        products_added: vec![ProductAdded {
            product_code: "P1".into(),
            quantity: 2,
        }],
        products_failed: vec![],
        step_log: vec![gsp_core::StepLogEntry::new(
            gsp_core::LogLevel::Info,
            "completed",
            "order placed",
        )],
        current_step: "completed".into(),
    }
}

fn failure_result() -> OrderResult {
    OrderResult {
        success: false,
        error: Some("cart row did not appear".into()),
        error_step: Some("cart".into()),
        screenshot_path: None,
        duration_seconds: 4.0,
        products_added: vec![],
        products_failed: vec![ProductFailed {
            product_code: "P1".into(),
            error: "cart row did not appear".into(),
        }],
        step_log: vec![],
        current_step: "cart".into(),
    }
}

async fn seed_single_order_batch(store: &MemoryStore, max_retries: i32) -> (gsp_core::BatchId, gsp_core::OrderId) {
    let batch_id = store
        .create_batch(
            "test batch",
            None,
            None,
            vec![NewOrder {
                consultora_code: "C001".into(),
                consultora_name: None,
                max_retries,
                products: vec![NewProduct {
                    product_code: "P1".into(),
                    quantity: 2,
                }],
            }],
        )
        .await
        .unwrap();
    let orders = store.get_batch_orders(batch_id, None).await.unwrap();
    (batch_id, orders[0].id)
}

#[tokio::test]
async fn happy_path_single_order_completes() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let (batch_id, order_id) = seed_single_order_batch(&store, 3).await;

    queue
        .enqueue(
            Lane::Orders,
            "process_order",
            serde_json::json!({ "order_id": order_id.get() }),
            EnqueueOptions::for_order_task(),
        )
        .await
        .unwrap();

    let executor = Arc::new(FakeExecutor {
        result: success_result(),
    });
    let worker = WorkerTask::new(
        store.clone() as Arc<dyn Store>,
        queue.clone() as Arc<dyn WorkQueue>,
        executor,
        "worker-1",
        30,
    );

    let outcome = worker.run_once().await.unwrap().unwrap();
    assert!(matches!(outcome, TaskOutcome::Completed));

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.worker_id.as_deref(), Some("worker-1"));

    let batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.completed_orders, 1);
    assert_eq!(batch.status, BatchStatus::Completed);

    assert!(queue.claim(Lane::Orders).await.unwrap().is_none());
}

#[tokio::test]
async fn retriable_failure_reschedules_until_retries_exhausted_then_fails() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let (_, order_id) = seed_single_order_batch(&store, 1).await;

    queue
        .enqueue(
            Lane::Orders,
            "process_order",
            serde_json::json!({ "order_id": order_id.get() }),
            EnqueueOptions::for_order_task(),
        )
        .await
        .unwrap();

    let executor = Arc::new(FakeExecutor {
        result: failure_result(),
    });
    let worker = WorkerTask::new(
        store.clone() as Arc<dyn Store>,
        queue.clone() as Arc<dyn WorkQueue>,
        executor.clone(),
        "worker-1",
        30,
    );

    // First attempt: retry_count (0) < max_retries (1), so it retries.
    let outcome = worker.run_once().await.unwrap().unwrap();
    assert!(matches!(outcome, TaskOutcome::Retrying { countdown_seconds } if countdown_seconds == 30));
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Retrying);
    assert_eq!(order.retry_count, 1);

    // Force the retried task immediately claimable for the test instead of
    // waiting out the real countdown.
    let claimed = queue.claim(Lane::Orders).await.unwrap();
    assert!(claimed.is_none(), "countdown has not elapsed yet");
}

#[tokio::test]
async fn redelivery_of_an_already_in_progress_order_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let (_, order_id) = seed_single_order_batch(&store, 3).await;

    // Simulate a worker that already claimed the order (e.g. a crashed
    // worker whose lease was reassigned) before this task runs.
    store
        .transition_order(
            order_id,
            &[OrderStatus::Pending],
            OrderStatus::InProgress,
            gsp_core::OrderPatch::new().with_worker("worker-0", "previous-task"),
        )
        .await
        .unwrap();

    queue
        .enqueue(
            Lane::Orders,
            "process_order",
            serde_json::json!({ "order_id": order_id.get() }),
            EnqueueOptions::for_order_task(),
        )
        .await
        .unwrap();

    let executor = Arc::new(FakeExecutor {
        result: success_result(),
    });
    let worker = WorkerTask::new(
        store.clone() as Arc<dyn Store>,
        queue as Arc<dyn WorkQueue>,
        executor,
        "worker-1",
        30,
    );

    let outcome = worker.run_once().await.unwrap().unwrap();
    assert!(matches!(outcome, TaskOutcome::Redelivered));

    // Order ownership is untouched — still owned by worker-0.
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.worker_id.as_deref(), Some("worker-0"));
}

#[tokio::test]
async fn empty_product_list_is_a_terminal_validation_failure() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let batch_id = store
        .create_batch(
            "empty products batch",
            None,
            None,
            vec![NewOrder {
                consultora_code: "C002".into(),
                consultora_name: None,
                max_retries: 3,
                products: vec![],
            }],
        )
        .await
        .unwrap();
    let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;

    queue
        .enqueue(
            Lane::Orders,
            "process_order",
            serde_json::json!({ "order_id": order_id.get() }),
            EnqueueOptions::for_order_task(),
        )
        .await
        .unwrap();

    let executor = Arc::new(FakeExecutor {
        result: success_result(),
    });
    let worker = WorkerTask::new(
        store.clone() as Arc<dyn Store>,
        queue as Arc<dyn WorkQueue>,
        executor,
        "worker-1",
        30,
    );

    let outcome = worker.run_once().await.unwrap().unwrap();
    assert!(matches!(outcome, TaskOutcome::ValidationFailed));

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.error_step.as_deref(), Some("validation"));

    let batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.failed_orders, 1);
    assert_eq!(batch.status, BatchStatus::Failed);
}

#[tokio::test]
async fn claim_on_empty_lane_returns_none() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let executor = Arc::new(FakeExecutor {
        result: success_result(),
    });
    let worker = WorkerTask::new(
        store as Arc<dyn Store>,
        queue as Arc<dyn WorkQueue>,
        executor,
        "worker-1",
        30,
    );

    assert!(worker.run_once().await.unwrap().is_none());
}
