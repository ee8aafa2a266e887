//! Process wiring: turns a loaded `AppConfig` into running Store/Queue
//! handles and, depending on which subcommand invoked it, either the
//! Control API + batch dispatcher, or a single order-worker slot.
//!
//! One OS process per worker slot (`gsp-bot worker`), not N tokio tasks
//! sharing one process — a wedged `chromiumoxide` session must not be
//! able to stall its siblings' event loop (see DESIGN.md). `gsp-bot
//! serve` launches the configured worker count as child processes for
//! convenience; each constructs its own connection pool on startup
//! rather than inheriting one, the Rust analogue of disposing and
//! recreating a forked Celery worker's engine handle.

use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Duration;

use gsp_driver::Driver;
use gsp_orchestrator::Orchestrator;
use gsp_queue::{PgQueue, WorkQueue};
use gsp_store::{PgStore, Store};
use gsp_telemetry::Metrics;
use gsp_worker::WorkerTask;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Connects a fresh Store/Queue pair for the calling process. Never
/// shares a pool across a process boundary — see module docs.
pub async fn connect(config: &AppConfig) -> AppResult<(Arc<dyn Store>, Arc<dyn WorkQueue>)> {
    let store = PgStore::connect(&config.store.database_url(), config.store.max_connections).await?;
    store.run_migrations().await?;
    let queue = PgQueue::connect(&config.store.queue_url(), config.store.max_connections).await?;
    queue.run_migrations().await?;
    Ok((Arc::new(store), Arc::new(queue)))
}

/// The Control API + batch dispatcher process. Holds no reference to any
/// worker's browser session; it only ever talks to workers indirectly
/// through the queue.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
    orchestrator: Arc<Orchestrator>,
    worker_children: Vec<Child>,
}

impl Application {
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let (store, queue) = connect(&config).await?;
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), queue.clone()));
        Ok(Self {
            config,
            store,
            queue,
            orchestrator,
            worker_children: Vec::new(),
        })
    }

    /// Nothing beyond connectivity to validate today; kept as a distinct
    /// step so future startup checks (portal reachability, schema
    /// version) have a natural home, separate from construction.
    pub async fn run_preflight(&self) -> AppResult<()> {
        self.store
            .list_batches()
            .await
            .map(|_| ())
            .map_err(|e| AppError::Preflight(e.to_string()))
    }

    /// Spawns the configured worker processes, then runs the Control API
    /// and the batch-dispatcher loop until the process receives a
    /// shutdown signal.
    pub async fn run(mut self) -> AppResult<()> {
        self.spawn_worker_processes()?;

        let api_state = gsp_api::AppState::new(self.store.clone(), self.queue.clone(), self.config.api.clone());
        let server = tokio::spawn(async move {
            if let Err(err) = gsp_api::run_server(api_state).await {
                error!(error = %err, "control API server exited with an error");
            }
        });

        let dispatcher_store = self.store.clone();
        let dispatcher_queue = self.queue.clone();
        let poll_interval = Duration::from_millis(self.config.worker.poll_interval_ms);
        let dispatcher = tokio::spawn(async move {
            run_dispatcher_loop(dispatcher_store, dispatcher_queue, poll_interval).await;
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            res = server => {
                if let Err(err) = res {
                    error!(error = %err, "control API task panicked");
                }
            }
            res = dispatcher => {
                if let Err(err) = res {
                    error!(error = %err, "dispatcher task panicked");
                }
            }
        }

        self.shutdown_worker_processes();
        Ok(())
    }

    fn spawn_worker_processes(&mut self) -> AppResult<()> {
        let exe = std::env::current_exe()?;
        for index in 0..self.config.worker.worker_count {
            let child = Command::new(&exe)
                .arg("worker")
                .spawn()
                .map_err(AppError::Io)?;
            info!(worker_index = index, pid = child.id(), "spawned worker process");
            self.worker_children.push(child);
        }
        Ok(())
    }

    fn shutdown_worker_processes(&mut self) {
        for mut child in self.worker_children.drain(..) {
            if let Err(err) = child.kill() {
                warn!(error = %err, "failed to terminate worker child process");
            }
        }
    }
}

/// Claims `batches` lane tasks one at a time and fans each into the
/// `orders` lane via `BatchDispatcher`. Runs until the process exits.
async fn run_dispatcher_loop(store: Arc<dyn Store>, queue: Arc<dyn WorkQueue>, poll_interval: Duration) {
    let dispatcher = gsp_dispatcher::BatchDispatcher::new(store, queue.clone());
    loop {
        if let Ok(depth) = queue.count(gsp_queue::Lane::Orders).await {
            Metrics::queue_depth_set("orders", depth as f64);
        }
        if let Ok(depth) = queue.count(gsp_queue::Lane::Batches).await {
            Metrics::queue_depth_set("batches", depth as f64);
        }
        match queue.claim(gsp_queue::Lane::Batches).await {
            Ok(Some(claimed)) => {
                let batch_id = match parse_batch_id(&claimed.args) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(error = %err, "malformed dispatch_batch task, failing it");
                        let _ = queue.fail(claimed, &err.to_string(), false).await;
                        continue;
                    }
                };
                match dispatcher.dispatch(batch_id).await {
                    Ok(summary) => {
                        info!(batch_id = %batch_id, dispatched = summary.dispatched, "batch dispatch completed");
                        let _ = queue.complete(claimed).await;
                    }
                    Err(err) => {
                        error!(batch_id = %batch_id, error = %err, "batch dispatch failed");
                        let _ = queue.fail(claimed, &err.to_string(), false).await;
                    }
                }
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(err) => {
                error!(error = %err, "dispatcher queue claim failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

fn parse_batch_id(args: &serde_json::Value) -> AppResult<gsp_core::BatchId> {
    args.get("batch_id")
        .and_then(serde_json::Value::as_i64)
        .map(gsp_core::BatchId::new)
        .ok_or_else(|| AppError::Preflight("dispatch_batch task missing integer batch_id".into()))
}

/// The `gsp-bot worker` process entry point: one order at a time, its
/// own Store/Queue pool, its own `Driver`.
pub async fn run_worker(config: AppConfig) -> AppResult<()> {
    let (store, queue) = connect(&config).await?;
    let driver = Arc::new(Driver::new(config.browser.clone().into()));
    let worker_id = format!("{}-{}", hostname(), std::process::id());
    let task = WorkerTask::new(
        store,
        queue,
        driver,
        worker_id.clone(),
        config.retry.retry_delay_seconds,
    );
    let poll_interval = Duration::from_millis(config.worker.poll_interval_ms);

    info!(worker_id = %worker_id, "worker process ready");
    loop {
        Metrics::active_workers_set(&worker_id, 1);
        let outcome = task.run_once().await;
        Metrics::active_workers_set(&worker_id, 0);
        match outcome {
            Ok(Some(outcome)) => info!(?outcome, "order task processed"),
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(err) => {
                error!(error = %err, "worker task errored, backing off");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string())
}
