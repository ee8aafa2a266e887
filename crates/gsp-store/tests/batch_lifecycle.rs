use gsp_core::{OrderPatch, OrderStatus};
use gsp_store::store::{NewOrder, NewProduct, Store};
use gsp_store::MemoryStore;

fn order_with(code: &str, products: Vec<(&str, i32)>) -> NewOrder {
    NewOrder {
        consultora_code: code.to_string(),
        consultora_name: None,
        max_retries: 3,
        products: products
            .into_iter()
            .map(|(code, qty)| NewProduct {
                product_code: code.to_string(),
                quantity: qty,
            })
            .collect(),
    }
}

#[tokio::test]
async fn mixed_batch_completes_and_fails_partially() {
    let store = MemoryStore::new();
    let batch_id = store
        .create_batch(
            "mixed",
            None,
            None,
            vec![
                order_with("C001", vec![("P1", 1)]),
                order_with("C002", vec![("P2", 2)]),
                order_with("C003", vec![("P3", 1)]),
            ],
        )
        .await
        .unwrap();

    let orders = store.get_batch_orders(batch_id, None).await.unwrap();
    assert_eq!(orders.len(), 3);

    // Two succeed, one fails permanently.
    for order in &orders[..2] {
        store
            .transition_order(
                order.id,
                &[OrderStatus::Pending],
                OrderStatus::Completed,
                OrderPatch::new().with_finished_now(),
            )
            .await
            .unwrap();
    }
    store
        .transition_order(
            orders[2].id,
            &[OrderStatus::Pending],
            OrderStatus::Failed,
            OrderPatch::new().with_error("login", "timeout"),
        )
        .await
        .unwrap();

    store.recompute_batch_counters(batch_id).await.unwrap();
    let batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.completed_orders, 2);
    assert_eq!(batch.failed_orders, 1);
    assert_eq!(batch.status.as_str(), "failed");
}

#[tokio::test]
async fn pause_then_resume_round_trips_pending_orders() {
    let store = MemoryStore::new();
    let batch_id = store
        .create_batch("pausable", None, None, vec![order_with("C001", vec![("P1", 1)])])
        .await
        .unwrap();
    let orders = store.get_batch_orders(batch_id, None).await.unwrap();
    let order_id = orders[0].id;

    // Dispatcher queues it.
    store
        .transition_order(order_id, &[OrderStatus::Pending], OrderStatus::Queued, OrderPatch::new())
        .await
        .unwrap();

    // Orchestrator pauses: queued orders reset to pending.
    store
        .transition_order(order_id, &[OrderStatus::Queued], OrderStatus::Pending, OrderPatch::new())
        .await
        .unwrap();

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status.as_str(), "pending");
}

#[tokio::test]
async fn manual_retry_from_failed_resets_error_fields() {
    let store = MemoryStore::new();
    let batch_id = store
        .create_batch("retriable", None, None, vec![order_with("C001", vec![("P1", 1)])])
        .await
        .unwrap();
    let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;

    store
        .transition_order(
            order_id,
            &[OrderStatus::Pending],
            OrderStatus::Failed,
            OrderPatch::new().with_error("cart", "boom"),
        )
        .await
        .unwrap();

    store.bump_retry(order_id).await.unwrap();
    let ok = store
        .transition_order(
            order_id,
            &[OrderStatus::Failed],
            OrderStatus::Retrying,
            OrderPatch::new().clearing_error(),
        )
        .await
        .unwrap();
    assert!(ok);

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.retry_count, 1);
    assert!(order.error_message.is_none());
}

#[tokio::test]
async fn concurrent_transition_attempts_only_one_wins() {
    let store = MemoryStore::new();
    let batch_id = store
        .create_batch("race", None, None, vec![order_with("C001", vec![("P1", 1)])])
        .await
        .unwrap();
    let order_id = store.get_batch_orders(batch_id, None).await.unwrap()[0].id;

    let a = store.transition_order(
        order_id,
        &[OrderStatus::Pending],
        OrderStatus::InProgress,
        OrderPatch::new().with_worker("w1", "t1"),
    );
    let b = store.transition_order(
        order_id,
        &[OrderStatus::Pending],
        OrderStatus::InProgress,
        OrderPatch::new().with_worker("w2", "t2"),
    );
    let (ra, rb) = tokio::join!(a, b);
    let wins = [ra.unwrap(), rb.unwrap()].into_iter().filter(|&x| x).count();
    assert_eq!(wins, 1, "exactly one redelivery should win the conditional transition");
}
