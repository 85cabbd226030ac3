use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::Error;

use super::routes::{build_router, ApiState};

/// Bind the configured address and serve the API until ctrl-c.
pub async fn start_api_server(config: AppConfig) -> crate::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid API address: {}", e)))?;

    let state = ApiState::from_config(&config)?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::io(e, format!("bind API server on {}", addr)))?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::internal(format!("API server error: {}", e)))?;

    info!("API server shutdown completed");
    Ok(())
}
