//! Order entity: one consultora plus its product list, the unit of work
//! assigned to a single worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, OrderId};

/// Coarse lifecycle state of an order.
///
/// More granular in-progress waypoints (login complete, consultora
/// selected, cycle selected, cart open, products added) are carried as
/// values of `Order::current_step` rather than additional variants here —
/// the worker only ever conditionally transitions through this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Queued,
    InProgress,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Statuses from which a batch-level pause/cancel/dispatch may act.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Queued => "queued",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Retrying => "retrying",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => OrderStatus::Pending,
            "queued" => OrderStatus::Queued,
            "in_progress" => OrderStatus::InProgress,
            "retrying" => OrderStatus::Retrying,
            "completed" => OrderStatus::Completed,
            "failed" => OrderStatus::Failed,
            "cancelled" => OrderStatus::Cancelled,
            other => {
                return Err(crate::error::CoreError::InvalidConfig(format!(
                    "unknown order status: {other}"
                )))
            }
        })
    }
}

/// One consultora plus its product list within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub batch_id: BatchId,
    pub consultora_code: String,
    pub consultora_name: Option<String>,
    pub status: OrderStatus,
    /// Free-form progress waypoint tag, see `progress::step_progress_percent`.
    pub current_step: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub task_id: Option<String>,
    pub worker_id: Option<String>,
    pub error_message: Option<String>,
    pub error_step: Option<String>,
    pub screenshot_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Default manual-retry ceiling: `max_retries + 2`, reserving exactly
    /// two manual-retry attempts beyond the automatic budget.
    #[must_use]
    pub fn retry_ceiling(&self) -> i32 {
        self.max_retries + 2
    }

    #[must_use]
    pub fn can_retry_automatically(&self) -> bool {
        self.retry_count < self.max_retries
    }

    #[must_use]
    pub fn can_retry_manually(&self) -> bool {
        self.retry_count < self.retry_ceiling()
    }
}

/// A sparse set of field updates applied atomically alongside a status
/// transition. `None` leaves the corresponding column untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub current_step: Option<Option<String>>,
    pub task_id: Option<Option<String>>,
    pub worker_id: Option<Option<String>>,
    pub error_message: Option<Option<String>>,
    pub error_step: Option<Option<String>>,
    pub screenshot_path: Option<Option<String>>,
    pub duration_seconds: Option<Option<f64>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub finished_at: Option<Option<DateTime<Utc>>>,
}

impl OrderPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_current_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(Some(step.into()));
        self
    }

    #[must_use]
    pub fn with_worker(mut self, worker_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        self.worker_id = Some(Some(worker_id.into()));
        self.task_id = Some(Some(task_id.into()));
        self
    }

    /// Set (or clear, with `None`) `task_id` without touching `worker_id` —
    /// used by the dispatcher, which assigns a queue task before any worker
    /// has claimed the order.
    #[must_use]
    pub fn with_task_id(mut self, task_id: Option<String>) -> Self {
        self.task_id = Some(task_id);
        self
    }

    #[must_use]
    pub fn with_started_now(mut self) -> Self {
        self.started_at = Some(Some(Utc::now()));
        self
    }

    #[must_use]
    pub fn with_finished_now(mut self) -> Self {
        self.finished_at = Some(Some(Utc::now()));
        self
    }

    #[must_use]
    pub fn with_error(mut self, step: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_step = Some(Some(step.into()));
        self.error_message = Some(Some(message.into()));
        self
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(Some(path.into()));
        self
    }

    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(Some(seconds));
        self
    }

    #[must_use]
    pub fn clearing_error(mut self) -> Self {
        self.error_message = Some(None);
        self.error_step = Some(None);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(1),
            batch_id: BatchId::new(1),
            consultora_code: "C001".into(),
            consultora_name: None,
            status: OrderStatus::Failed,
            current_step: None,
            retry_count: 3,
            max_retries: 3,
            task_id: None,
            worker_id: None,
            error_message: None,
            error_step: None,
            screenshot_path: None,
            duration_seconds: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn automatic_retry_exhausted_at_max_retries() {
        let order = sample_order();
        assert!(!order.can_retry_automatically());
    }

    #[test]
    fn manual_retry_allows_two_more_than_automatic() {
        let mut order = sample_order();
        assert!(order.can_retry_manually());
        order.retry_count = order.retry_ceiling();
        assert!(!order.can_retry_manually());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Retrying.is_terminal());
    }

    #[test]
    fn patch_builder_sets_only_requested_fields() {
        let patch = OrderPatch::new().with_current_step("login").clearing_error();
        assert_eq!(patch.current_step, Some(Some("login".to_string())));
        assert_eq!(patch.error_message, Some(None));
        assert!(patch.worker_id.is_none());
    }
}
