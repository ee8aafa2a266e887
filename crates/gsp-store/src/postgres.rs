//! Postgres-backed `Store` implementation.

use async_trait::async_trait;
use chrono::Utc;
use gsp_core::{
    Batch, BatchId, BatchStats, BatchStatus, Order, OrderId, OrderLog, OrderLogId, OrderPatch,
    OrderProduct, OrderProductId, OrderStatus, ProductStatus, StepLogEntry,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};
use crate::store::{NewOrder, Store};

/// Owns a connection pool constructed fresh by each process. Never share a
/// `PgStore`'s pool across a process fork/spawn boundary — each worker
/// process builds its own via `PgStore::connect` after it starts.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_batch(row: &sqlx::postgres::PgRow) -> StoreResult<Batch> {
    let status: String = row.try_get("status")?;
    Ok(Batch {
        id: BatchId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: parse_batch_status(&status)?,
        total_orders: row.try_get("total_orders")?,
        completed_orders: row.try_get("completed_orders")?,
        failed_orders: row.try_get("failed_orders")?,
        source_file: row.try_get("source_file")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn parse_batch_status(s: &str) -> StoreResult<BatchStatus> {
    Ok(match s {
        "pending" => BatchStatus::Pending,
        "running" => BatchStatus::Running,
        "paused" => BatchStatus::Paused,
        "completed" => BatchStatus::Completed,
        "failed" => BatchStatus::Failed,
        "cancelled" => BatchStatus::Cancelled,
        other => {
            return Err(StoreError::Core(gsp_core::CoreError::InvalidConfig(
                format!("unknown batch status in database: {other}"),
            )))
        }
    })
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> StoreResult<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        batch_id: BatchId::new(row.try_get("batch_id")?),
        consultora_code: row.try_get("consultora_code")?,
        consultora_name: row.try_get("consultora_name")?,
        status: OrderStatus::from_str(&status).map_err(StoreError::Core)?,
        current_step: row.try_get("current_step")?,
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        task_id: row.try_get("task_id")?,
        worker_id: row.try_get("worker_id")?,
        error_message: row.try_get("error_message")?,
        error_step: row.try_get("error_step")?,
        screenshot_path: row.try_get("screenshot_path")?,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn row_to_product(row: &sqlx::postgres::PgRow) -> StoreResult<OrderProduct> {
    let status: String = row.try_get("status")?;
    Ok(OrderProduct {
        id: OrderProductId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_code: row.try_get("product_code")?,
        quantity: row.try_get("quantity")?,
        status: match status.as_str() {
            "pending" => ProductStatus::Pending,
            "added" => ProductStatus::Added,
            "failed" => ProductStatus::Failed,
            "not_found" => ProductStatus::NotFound,
            other => {
                return Err(StoreError::Core(gsp_core::CoreError::InvalidConfig(
                    format!("unknown product status: {other}"),
                )))
            }
        },
        error_message: row.try_get("error_message")?,
        added_at: row.try_get("added_at")?,
    })
}

fn row_to_log(row: &sqlx::postgres::PgRow) -> StoreResult<OrderLog> {
    let level: String = row.try_get("level")?;
    Ok(OrderLog {
        id: OrderLogId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        level: match level.as_str() {
            "DEBUG" => gsp_core::LogLevel::Debug,
            "INFO" => gsp_core::LogLevel::Info,
            "WARNING" => gsp_core::LogLevel::Warning,
            "ERROR" => gsp_core::LogLevel::Error,
            other => {
                return Err(StoreError::Core(gsp_core::CoreError::InvalidConfig(
                    format!("unknown log level: {other}"),
                )))
            }
        },
        step: row.try_get("step")?,
        message: row.try_get("message")?,
        details: row.try_get("details")?,
        screenshot_path: row.try_get("screenshot_path")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn create_batch(
        &self,
        name: &str,
        description: Option<&str>,
        source_file: Option<&str>,
        orders: Vec<NewOrder>,
    ) -> StoreResult<BatchId> {
        let mut tx = self.pool.begin().await?;

        let batch_row = sqlx::query(
            "INSERT INTO batches (name, description, status, total_orders, source_file)
             VALUES ($1, $2, 'pending', $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(description)
        .bind(orders.len() as i32)
        .bind(source_file)
        .fetch_one(&mut *tx)
        .await?;
        let batch_id: i64 = batch_row.try_get("id")?;

        for order in orders {
            let order_row = sqlx::query(
                "INSERT INTO orders (batch_id, consultora_code, consultora_name, status, max_retries)
                 VALUES ($1, $2, $3, 'pending', $4) RETURNING id",
            )
            .bind(batch_id)
            .bind(&order.consultora_code)
            .bind(&order.consultora_name)
            .bind(order.max_retries)
            .fetch_one(&mut *tx)
            .await?;
            let order_id: i64 = order_row.try_get("id")?;

            for product in order.products {
                OrderProduct::validate_quantity(product.quantity)?;
                sqlx::query(
                    "INSERT INTO order_products (order_id, product_code, quantity, status)
                     VALUES ($1, $2, $3, 'pending')",
                )
                .bind(order_id)
                .bind(&product.product_code)
                .bind(product.quantity)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(BatchId::new(batch_id))
    }

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<Batch>> {
        let row = sqlx::query("SELECT * FROM batches WHERE id = $1")
            .bind(batch_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_batch).transpose()
    }

    async fn list_batches(&self) -> StoreResult<Vec<Batch>> {
        let rows = sqlx::query("SELECT * FROM batches ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_batch).collect()
    }

    async fn get_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn get_batch_orders(
        &self,
        batch_id: BatchId,
        status_filter: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let rows = match status_filter {
            Some(status) => {
                sqlx::query("SELECT * FROM orders WHERE batch_id = $1 AND status = $2 ORDER BY id")
                    .bind(batch_id.get())
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM orders WHERE batch_id = $1 ORDER BY id")
                    .bind(batch_id.get())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_order).collect()
    }

    async fn get_order_logs(&self, order_id: OrderId) -> StoreResult<Vec<OrderLog>> {
        let rows = sqlx::query("SELECT * FROM order_logs WHERE order_id = $1 ORDER BY id")
            .bind(order_id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_log).collect()
    }

    async fn get_order_products(&self, order_id: OrderId) -> StoreResult<Vec<OrderProduct>> {
        let rows = sqlx::query("SELECT * FROM order_products WHERE order_id = $1 ORDER BY id")
            .bind(order_id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> StoreResult<bool> {
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

        // Conditional UPDATE ... WHERE status = ANY($1) RETURNING, applying
        // the sparse patch inline. Each Option<Option<T>> field is
        // coalesced against the existing column when unset.
        let row = sqlx::query(
            r#"
            UPDATE orders SET
                status = $1,
                current_step = CASE WHEN $2 THEN $3 ELSE current_step END,
                task_id = CASE WHEN $4 THEN $5 ELSE task_id END,
                worker_id = CASE WHEN $6 THEN $7 ELSE worker_id END,
                error_message = CASE WHEN $8 THEN $9 ELSE error_message END,
                error_step = CASE WHEN $10 THEN $11 ELSE error_step END,
                screenshot_path = CASE WHEN $12 THEN $13 ELSE screenshot_path END,
                duration_seconds = CASE WHEN $14 THEN $15 ELSE duration_seconds END,
                started_at = CASE WHEN $16 THEN $17 ELSE started_at END,
                finished_at = CASE WHEN $18 THEN $19 ELSE finished_at END,
                updated_at = now()
            WHERE id = $20 AND status = ANY($21)
            RETURNING id
            "#,
        )
        .bind(to.as_str())
        .bind(patch.current_step.is_some())
        .bind(patch.current_step.flatten())
        .bind(patch.task_id.is_some())
        .bind(patch.task_id.flatten())
        .bind(patch.worker_id.is_some())
        .bind(patch.worker_id.flatten())
        .bind(patch.error_message.is_some())
        .bind(patch.error_message.flatten())
        .bind(patch.error_step.is_some())
        .bind(patch.error_step.flatten())
        .bind(patch.screenshot_path.is_some())
        .bind(patch.screenshot_path.flatten())
        .bind(patch.duration_seconds.is_some())
        .bind(patch.duration_seconds.flatten())
        .bind(patch.started_at.is_some())
        .bind(patch.started_at.flatten())
        .bind(patch.finished_at.is_some())
        .bind(patch.finished_at.flatten())
        .bind(order_id.get())
        .bind(&from_strs)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn bump_retry(&self, order_id: OrderId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE orders SET retry_count = retry_count + 1, error_message = NULL,
             error_step = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(order_id.get())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_product_status(
        &self,
        order_product_id: OrderProductId,
        status: ProductStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE order_products SET status = $1, error_message = $2,
             added_at = CASE WHEN $1 = 'added' THEN now() ELSE added_at END
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(order_product_id.get())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_log(&self, order_id: OrderId, entry: StepLogEntry) -> StoreResult<OrderLogId> {
        let row = sqlx::query(
            "INSERT INTO order_logs (order_id, level, step, message, details, screenshot_path, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(order_id.get())
        .bind(entry.level.as_str())
        .bind(&entry.step)
        .bind(&entry.message)
        .bind(&entry.details)
        .bind(&entry.screenshot_path)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(OrderLogId::new(row.try_get("id")?))
    }

    async fn recompute_batch_counters(&self, batch_id: BatchId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the batch for the duration of the recompute.
        sqlx::query("SELECT id FROM batches WHERE id = $1 FOR UPDATE")
            .bind(batch_id.get())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::BatchNotFound(batch_id))?;

        let counts = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) AS total
             FROM orders WHERE batch_id = $1",
        )
        .bind(batch_id.get())
        .fetch_one(&mut *tx)
        .await?;

        let completed: i64 = counts.try_get("completed")?;
        let failed: i64 = counts.try_get("failed")?;
        let total: i64 = counts.try_get("total")?;

        let all_terminal = completed + failed >= total;
        let new_status = if !all_terminal {
            None
        } else if failed > 0 {
            Some(BatchStatus::Failed)
        } else {
            Some(BatchStatus::Completed)
        };

        match new_status {
            Some(status) => {
                sqlx::query(
                    "UPDATE batches SET completed_orders = $1, failed_orders = $2,
                     status = $3, finished_at = now(), updated_at = now() WHERE id = $4",
                )
                .bind(completed as i32)
                .bind(failed as i32)
                .bind(status.as_str())
                .bind(batch_id.get())
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE batches SET completed_orders = $1, failed_orders = $2,
                     updated_at = now() WHERE id = $3",
                )
                .bind(completed as i32)
                .bind(failed as i32)
                .bind(batch_id.get())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn batch_stats(&self, batch_id: BatchId) -> StoreResult<BatchStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'retrying') AS retrying,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                AVG(duration_seconds) FILTER (WHERE status IN ('completed', 'failed')) AS mean_duration
             FROM orders WHERE batch_id = $1",
        )
        .bind(batch_id.get())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let completed: i64 = row.try_get("completed")?;
        let failed: i64 = row.try_get("failed")?;
        let cancelled: i64 = row.try_get("cancelled")?;
        let pending: i64 = row.try_get("pending")?;
        let queued: i64 = row.try_get("queued")?;
        let in_progress: i64 = row.try_get("in_progress")?;
        let retrying: i64 = row.try_get("retrying")?;
        let mean_duration: Option<f64> = row.try_get("mean_duration")?;

        let terminal = completed + failed + cancelled;
        let progress_percent = if total == 0 {
            0.0
        } else {
            (terminal as f64 / total as f64) * 100.0
        };
        let remaining = total - terminal;
        let eta_seconds = mean_duration.map(|mean| mean * remaining as f64);

        Ok(BatchStats {
            batch_id,
            total_orders: total as i32,
            pending: pending as i32,
            queued: queued as i32,
            in_progress: in_progress as i32,
            retrying: retrying as i32,
            completed: completed as i32,
            failed: failed as i32,
            cancelled: cancelled as i32,
            progress_percent,
            mean_duration_seconds: mean_duration,
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
        let now = Utc::now();
        sqlx::query(
            "UPDATE batches SET status = $1,
             started_at = CASE WHEN $2 AND started_at IS NULL THEN $3 ELSE started_at END,
             finished_at = CASE WHEN $4 THEN $3 ELSE finished_at END,
             updated_at = now()
             WHERE id = $5",
        )
        .bind(status.as_str())
        .bind(stamp_started)
        .bind(now)
        .bind(stamp_finished)
        .bind(batch_id.get())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_worker_count(&self) -> StoreResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT worker_id) AS n FROM orders
             WHERE status = 'in_progress' AND worker_id IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }

    async fn total_batch_count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn total_order_count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn orders_by_status_counts(&self) -> StoreResult<Vec<(OrderStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                let n: i64 = row.try_get("n")?;
                Ok((OrderStatus::from_str(&status).map_err(StoreError::Core)?, n))
            })
            .collect()
    }
}
