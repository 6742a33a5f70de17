//! axum server startup and shutdown handling

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::{AppState, create_app};
use crate::error::Result;

/// Serves the API on `bind_addr` until SIGINT or SIGTERM
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    serve(state, listener).await
}

/// Serves the API on an already bound listener
pub async fn serve(state: AppState, listener: TcpListener) -> Result<()> {
    let probes = state.aggregator.probe_count();
    let app = create_app(state);

    info!(addr = %listener.local_addr()?, probes, "Health check API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
