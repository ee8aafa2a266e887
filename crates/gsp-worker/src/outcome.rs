//! What happened to one claimed order task, used to decide how the
//! caller should resolve the claim against the queue.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Order id referenced by the task no longer exists.
    NotFound,
    /// The conditional transition to `in_progress` failed — this claim is
    /// a redelivery of an order another (or the same, previously-crashed)
    /// worker already owns.
    Redelivered,
    /// Order has no products; terminal `failed` at step `validation`.
    ValidationFailed,
    /// Driver succeeded; order transitioned to `completed`.
    Completed,
    /// Driver failed but the order has automatic retry budget left;
    /// `retrying` was scheduled with the given countdown.
    Retrying { countdown_seconds: i64 },
    /// Driver failed and automatic retries are exhausted; order is
    /// terminally `failed`.
    Failed,
    /// Something outside the driver's own error handling went wrong
    /// (store error, panic); order is `failed` at `unexpected_error` with
    /// one bounded cooperative retry scheduled.
    UnexpectedError { countdown_seconds: i64 },
}
