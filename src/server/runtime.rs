//! Server runtime.

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;

/// Serve `app` until Ctrl+C.
pub async fn run(config: &Config, app: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
