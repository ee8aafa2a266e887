//! Additional CLI surface over the same `Orchestrator` the Control API
//! uses — a `clap`-based analogue of the original `cli.py` quick-start
//! script. Additive convenience, no C1–C7 semantics of its own.

use clap::{Parser, Subcommand};

use gsp_core::{BatchId, OrderId};

use crate::app;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path (can also be set via GSP_CONFIG env var).
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Control API and the batch-dispatcher loop. Default.
    Serve,
    /// One order-worker slot: claims from the `orders` lane until killed.
    Worker,
    /// Load a CSV/Excel file the same way `POST /batches/upload` does.
    Load {
        file: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
    },
    /// Start a batch.
    Start { batch_id: i64 },
    /// Print a batch's stats.
    Status { batch_id: i64 },
    /// Re-queue a batch's failed orders.
    Retry { batch_id: i64 },
    /// Retry a single order.
    RetryOrder { order_id: i64 },
    /// Pause a batch.
    Pause { batch_id: i64 },
    /// Cancel a batch.
    Cancel { batch_id: i64 },
}

pub async fn dispatch(command: Commands, config: AppConfig) -> AppResult<()> {
    match command {
        Commands::Serve => {
            let app = app::Application::new(config).await?;
            app.run_preflight().await?;
            app.run().await
        }
        Commands::Worker => app::run_worker(config).await,
        Commands::Load { file, name, desc } => load(config, &file, name, desc).await,
        Commands::Start { batch_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            let task_id = orchestrator.start_batch(BatchId::new(batch_id)).await?;
            println!("batch {batch_id} start requested (task {task_id})");
            Ok(())
        }
        Commands::Status { batch_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            let stats = orchestrator.batch_stats(BatchId::new(batch_id)).await?;
            println!("{stats:#?}");
            Ok(())
        }
        Commands::Retry { batch_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            let task_id = orchestrator.retry_batch_failures(BatchId::new(batch_id)).await?;
            println!("batch {batch_id} failures re-queued (task {task_id})");
            Ok(())
        }
        Commands::RetryOrder { order_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            let task_id = orchestrator.retry_single_order(OrderId::new(order_id)).await?;
            println!("order {order_id} retry requested (task {task_id})");
            Ok(())
        }
        Commands::Pause { batch_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            orchestrator.pause_batch(BatchId::new(batch_id)).await?;
            println!("batch {batch_id} paused");
            Ok(())
        }
        Commands::Cancel { batch_id } => {
            let orchestrator = orchestrator_for(&config).await?;
            orchestrator.cancel_batch(BatchId::new(batch_id)).await?;
            println!("batch {batch_id} cancelled");
            Ok(())
        }
    }
}

async fn orchestrator_for(config: &AppConfig) -> AppResult<gsp_orchestrator::Orchestrator> {
    let (store, queue) = app::connect(config).await?;
    Ok(gsp_orchestrator::Orchestrator::new(store, queue))
}

async fn load(config: AppConfig, file: &str, name: Option<String>, desc: Option<String>) -> AppResult<()> {
    let bytes = std::fs::read(file)?;
    let orders = gsp_api::loader::parse_orders_csv(&bytes).map_err(AppError::Api)?;
    if orders.is_empty() {
        return Err(AppError::Config(format!("{file} contained no orders")));
    }
    let (store, _queue) = app::connect(&config).await?;
    let name = name.unwrap_or_else(|| format!("loaded from {file}"));
    let batch_id = store
        .create_batch(&name, desc.as_deref(), Some(file), orders)
        .await?;
    println!("created batch {batch_id}");
    Ok(())
}
