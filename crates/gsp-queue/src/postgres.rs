//! Postgres-backed `WorkQueue`, built on `SELECT ... FOR UPDATE SKIP
//! LOCKED` rather than a separate broker — the queue shares the Store's
//! connection pool, and a worker process constructs its own pool at
//! startup rather than inheriting one across a fork.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::error::QueueResult;
use crate::queue::WorkQueue;
use crate::types::{ClaimedTask, EnqueueOptions, Lane, ProgressMeta, TaskId};

const MAX_ERRORS: i32 = 10;

#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
}

impl PgQueue {
    pub async fn connect(database_url: &str, max_connections: u32) -> QueueResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> QueueResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn backoff_delay(num_errors: i32) -> Duration {
        Duration::seconds(i64::from(num_errors).pow(4) + 3)
    }
}

fn parse_lane(s: &str) -> Lane {
    match s {
        "orders" => Lane::Orders,
        "batches" => Lane::Batches,
        _ => Lane::Default,
    }
}

#[async_trait]
impl WorkQueue for PgQueue {
    async fn enqueue(
        &self,
        lane: Lane,
        task_name: &str,
        args: serde_json::Value,
        options: EnqueueOptions,
    ) -> QueueResult<TaskId> {
        let task_id = TaskId::new();
        sqlx::query(
            "INSERT INTO queue_tasks
                (id, lane, task_name, args, max_retries, default_retry_delay_seconds,
                 hard_time_limit_seconds, soft_time_limit_seconds, try_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())",
        )
        .bind(&task_id.0)
        .bind(lane.as_str())
        .bind(task_name)
        .bind(&args)
        .bind(options.max_retries)
        .bind(options.default_retry_delay_seconds)
        .bind(options.hard_time_limit_seconds)
        .bind(options.soft_time_limit_seconds)
        .execute(&self.pool)
        .await?;
        Ok(task_id)
    }

    async fn revoke(&self, task_id: &TaskId, terminate: bool) -> QueueResult<()> {
        if terminate {
            sqlx::query("UPDATE queue_tasks SET live = FALSE, updated_at = now() WHERE id = $1")
                .bind(&task_id.0)
                .execute(&self.pool)
                .await?;
        } else {
            // Only prevent a future claim; leave an already-claimed task
            // alone so its in-flight worker can finish naturally.
            sqlx::query(
                "UPDATE queue_tasks SET live = FALSE, updated_at = now()
                 WHERE id = $1 AND claimed_by IS NULL",
            )
            .bind(&task_id.0)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn report_progress(&self, task_id: &TaskId, meta: ProgressMeta) -> QueueResult<()> {
        let value = serde_json::to_value(meta)?;
        sqlx::query("UPDATE queue_tasks SET progress = $1, updated_at = now() WHERE id = $2")
            .bind(value)
            .bind(&task_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn retry(&self, task_id: &TaskId, countdown_seconds: i64) -> QueueResult<TaskId> {
        let try_at: DateTime<Utc> = Utc::now() + Duration::seconds(countdown_seconds);
        sqlx::query(
            "UPDATE queue_tasks SET claimed_by = NULL, claimed_at = NULL,
             lease_expires_at = NULL, try_at = $1, updated_at = now() WHERE id = $2",
        )
        .bind(try_at)
        .bind(&task_id.0)
        .execute(&self.pool)
        .await?;
        Ok(task_id.clone())
    }

    async fn claim(&self, lane: Lane) -> QueueResult<Option<ClaimedTask>> {
        let mut tx = self.pool.begin().await?;
        let worker_tag = uuid::Uuid::new_v4().to_string();

        let row = sqlx::query(
            "SELECT id, task_name, args, num_errors, max_retries, default_retry_delay_seconds,
                 hard_time_limit_seconds
             FROM queue_tasks
             WHERE lane = $1 AND live AND try_at <= now()
               AND (claimed_by IS NULL OR lease_expires_at < now())
             ORDER BY try_at
             LIMIT 1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(lane.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let task_id: String = row.try_get("id")?;
        let task_name: String = row.try_get("task_name")?;
        let args: serde_json::Value = row.try_get("args")?;
        let num_errors: i32 = row.try_get("num_errors")?;
        let max_retries: i32 = row.try_get("max_retries")?;
        let default_retry_delay_seconds: i64 = row.try_get("default_retry_delay_seconds")?;
        let hard_time_limit_seconds: i64 = row.try_get("hard_time_limit_seconds")?;

        let claimed_at = Utc::now();
        let lease_expires_at = claimed_at + Duration::seconds(hard_time_limit_seconds);
        sqlx::query(
            "UPDATE queue_tasks SET claimed_by = $1, claimed_at = $2, lease_expires_at = $3,
             updated_at = $2
             WHERE id = $4",
        )
        .bind(&worker_tag)
        .bind(claimed_at)
        .bind(lease_expires_at)
        .bind(&task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ClaimedTask {
            task_id: TaskId(task_id),
            lane,
            task_name,
            args,
            num_errors,
            max_retries,
            default_retry_delay_seconds,
            claimed_at,
        }))
    }

    async fn complete(&self, claimed: ClaimedTask) -> QueueResult<()> {
        sqlx::query("DELETE FROM queue_tasks WHERE id = $1")
            .bind(&claimed.task_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fail(&self, claimed: ClaimedTask, error: &str, requeue: bool) -> QueueResult<()> {
        let num_errors = claimed.num_errors + 1;
        if !requeue || num_errors >= MAX_ERRORS {
            sqlx::query(
                "UPDATE queue_tasks SET live = FALSE, num_errors = $1, last_error = $2,
                 claimed_by = NULL, claimed_at = NULL, lease_expires_at = NULL, updated_at = now()
                 WHERE id = $3",
            )
            .bind(num_errors)
            .bind(error)
            .bind(&claimed.task_id.0)
            .execute(&self.pool)
            .await?;
            return Ok(());
        }

        let try_at = Utc::now() + Self::backoff_delay(num_errors);
        sqlx::query(
            "UPDATE queue_tasks SET num_errors = $1, last_error = $2, try_at = $3,
             claimed_by = NULL, claimed_at = NULL, lease_expires_at = NULL, updated_at = now()
             WHERE id = $4",
        )
        .bind(num_errors)
        .bind(error)
        .bind(try_at)
        .bind(&claimed.task_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self, lane: Lane) -> QueueResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM queue_tasks WHERE lane = $1 AND live AND claimed_by IS NULL",
        )
        .bind(lane.as_str())
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }
}

/// Exposed so callers that read a lane string back from a JOIN elsewhere
/// in the workspace (e.g. telemetry) can reuse the same parsing.
pub fn lane_from_str(s: &str) -> Lane {
    parse_lane(s)
}
