//! System-wide aggregate stats, the `system_stats()` read model
//! (spec.md §4.6, extended by `SPEC_FULL.md` §0.6 with a distinct
//! `active_worker_count` substitute for a broker-side worker inspector).

use gsp_core::OrderStatus;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub active_workers: i64,
    pub total_batches: i64,
    pub total_orders: i64,
    pub orders_by_status: Vec<(OrderStatus, i64)>,
}
