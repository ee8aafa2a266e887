//! HTTP server bring-up for the control surface.

use std::net::SocketAddr;

use tracing::info;

use crate::state::AppState;

/// Bind and serve the control API until the process is signalled to stop.
pub async fn run_server(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let host = state.config.bind_host.clone();
    let port = state.config.port;
    let app = crate::routes::create_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "control API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
