//! Server startup and graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use dropcode_core::{format_file_size, Config};

use super::App;

/// How long shutdown waits for queued audit events to reach the disk
const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve until SIGINT/SIGTERM, then drain the audit log
pub async fn start_server(config: &Config, app: App) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_file_size = %format_file_size(config.max_file_size_bytes()),
        max_request_body = %format_file_size(config.max_request_body_bytes() as u64),
        allowed_extensions = config.allowed_extensions().len(),
        blocked_extensions = config.blocked_extensions().len(),
        data_dir = %config.data_dir().display(),
        "Server ready and accepting connections"
    );

    let App {
        state,
        router,
        audit_task,
    } = app;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The audit writer exits once the last sink handle is gone
    drop(state);
    if tokio::time::timeout(AUDIT_FLUSH_TIMEOUT, audit_task)
        .await
        .is_err()
    {
        tracing::warn!("Audit log did not drain before shutdown");
    }

    dropcode_infra::shutdown_telemetry().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
