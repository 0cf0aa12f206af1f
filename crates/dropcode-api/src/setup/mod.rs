//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use dropcode_core::Config;
use dropcode_infra::LogFormat;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything `main` needs to serve and then shut down cleanly
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Background audit writer; finishes once every sink handle is dropped
    pub audit_task: JoinHandle<()>,
}

/// Initialize telemetry, storage, services and routes
pub async fn initialize_app(config: Config) -> Result<App> {
    config.validate().context("Configuration validation failed")?;

    let log_format: LogFormat = config
        .log_format()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    dropcode_infra::init_telemetry(log_format, config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let (state, audit_task) = services::initialize_services(&config).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok(App {
        state,
        router,
        audit_task,
    })
}
