//! Bulk-order dispatch bot — entry point.

use clap::Parser;
use tracing::info;

use gsp_bot::cli::{Args, Commands};
use gsp_bot::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    gsp_telemetry::init_logging()?;
    info!("starting gsp-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    let command = args.command.unwrap_or(Commands::Serve);

    gsp_bot::cli::dispatch(command, config).await?;
    Ok(())
}
