//! Batch entity: one upload managed and reported on as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::BatchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Paused => "paused",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `Orchestrator::start_batch` may act from this state.
    #[must_use]
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            BatchStatus::Pending | BatchStatus::Paused | BatchStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub description: Option<String>,
    pub status: BatchStatus,
    pub total_orders: i32,
    pub completed_orders: i32,
    pub failed_orders: i32,
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Resolve the terminal status implied by the current counters, or
    /// `None` if orders are still outstanding. Mirrors the invariant in
    /// the data model: `completed ⇒ failed_orders = 0`,
    /// `failed ⇒ failed_orders > 0`, both requiring
    /// `completed + failed = total`.
    #[must_use]
    pub fn resolved_terminal_status(&self) -> Option<BatchStatus> {
        if self.completed_orders + self.failed_orders < self.total_orders {
            return None;
        }
        if self.failed_orders > 0 {
            Some(BatchStatus::Failed)
        } else {
            Some(BatchStatus::Completed)
        }
    }
}

/// Aggregate statistics computed on demand by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_id: BatchId,
    pub total_orders: i32,
    pub pending: i32,
    pub queued: i32,
    pub in_progress: i32,
    pub retrying: i32,
    pub completed: i32,
    pub failed: i32,
    pub cancelled: i32,
    pub progress_percent: f64,
    pub mean_duration_seconds: Option<f64>,
    pub eta_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch(total: i32, completed: i32, failed: i32) -> Batch {
        Batch {
            id: BatchId::new(1),
            name: "test".into(),
            description: None,
            status: BatchStatus::Running,
            total_orders: total,
            completed_orders: completed,
            failed_orders: failed,
            source_file: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn unresolved_while_orders_outstanding() {
        assert_eq!(sample_batch(10, 5, 0).resolved_terminal_status(), None);
    }

    #[test]
    fn resolves_completed_when_no_failures() {
        assert_eq!(
            sample_batch(10, 10, 0).resolved_terminal_status(),
            Some(BatchStatus::Completed)
        );
    }

    #[test]
    fn resolves_failed_when_any_order_failed() {
        assert_eq!(
            sample_batch(10, 8, 2).resolved_terminal_status(),
            Some(BatchStatus::Failed)
        );
    }

    #[test]
    fn startable_statuses() {
        assert!(BatchStatus::Pending.is_startable());
        assert!(BatchStatus::Paused.is_startable());
        assert!(BatchStatus::Failed.is_startable());
        assert!(!BatchStatus::Running.is_startable());
        assert!(!BatchStatus::Completed.is_startable());
    }
}
