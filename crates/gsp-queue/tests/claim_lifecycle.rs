use gsp_queue::{EnqueueOptions, Lane, MemoryQueue, WorkQueue};

#[tokio::test]
async fn claim_is_fifo_by_try_at() {
    let queue = MemoryQueue::new();
    let first = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({"order_id": 1}), EnqueueOptions::default())
        .await
        .unwrap();
    let second = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({"order_id": 2}), EnqueueOptions::default())
        .await
        .unwrap();

    let claimed_first = queue.claim(Lane::Orders).await.unwrap().unwrap();
    assert_eq!(claimed_first.task_id, first);
    queue.complete(claimed_first).await.unwrap();

    let claimed_second = queue.claim(Lane::Orders).await.unwrap().unwrap();
    assert_eq!(claimed_second.task_id, second);
}

#[tokio::test]
async fn claim_respects_lane_isolation() {
    let queue = MemoryQueue::new();
    queue
        .enqueue(Lane::Batches, "dispatch_batch", serde_json::json!({}), EnqueueOptions::for_batch_task())
        .await
        .unwrap();

    assert!(queue.claim(Lane::Orders).await.unwrap().is_none());
    assert!(queue.claim(Lane::Batches).await.unwrap().is_some());
}

#[tokio::test]
async fn retry_reopens_task_for_claim_after_countdown_elapses() {
    let queue = MemoryQueue::new();
    let task_id = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();
    queue.claim(Lane::Orders).await.unwrap();

    // countdown_seconds = 0 means immediately eligible again.
    queue.retry(&task_id, 0).await.unwrap();
    let reclaimed = queue.claim(Lane::Orders).await.unwrap();
    assert!(reclaimed.is_some());
}

#[tokio::test]
async fn revoke_with_terminate_prevents_future_claim() {
    let queue = MemoryQueue::new();
    let task_id = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();
    queue.revoke(&task_id, true).await.unwrap();
    assert!(queue.claim(Lane::Orders).await.unwrap().is_none());
}

#[tokio::test]
async fn crashed_worker_lease_is_reclaimed_on_next_claim() {
    let queue = MemoryQueue::new();
    let task_id = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();

    let first = queue.claim(Lane::Orders).await.unwrap().unwrap();
    assert_eq!(first.task_id, task_id);
    // Worker dies mid-task: never calls `complete`, `fail`, or `retry`.
    // The task stays invisible to `claim` until its lease lapses.
    assert!(queue.claim(Lane::Orders).await.unwrap().is_none());

    queue.force_expire_lease(&task_id);

    let redelivered = queue
        .claim(Lane::Orders)
        .await
        .unwrap()
        .expect("a lapsed lease should be redelivered, not lost forever");
    assert_eq!(redelivered.task_id, task_id);
}

#[tokio::test]
async fn count_excludes_claimed_and_dead_tasks() {
    let queue = MemoryQueue::new();
    queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();
    let second = queue
        .enqueue(Lane::Orders, "process_order", serde_json::json!({}), EnqueueOptions::default())
        .await
        .unwrap();

    assert_eq!(queue.count(Lane::Orders).await.unwrap(), 2);

    let claimed = queue.claim(Lane::Orders).await.unwrap().unwrap();
    assert_eq!(queue.count(Lane::Orders).await.unwrap(), 1);

    queue.fail(claimed, "network timeout", false).await.unwrap();
    assert_eq!(queue.count(Lane::Orders).await.unwrap(), 1, "dead task stays out of the count");
    assert!(queue.is_live(&second), "untouched second task is still live");
}
