//! Web server using Axum.

use std::net::SocketAddr;
use std::sync::Arc;

use super::{router::create_app_router, AppState};

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Run the web server until the process is stopped.
pub async fn run_server(config: WebServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_app_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {}:{}: {}", config.host, config.port, e))?;

    tracing::info!("Starting orchd on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("orchd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
