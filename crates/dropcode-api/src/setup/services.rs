//! Service wiring

use std::sync::Arc;

use anyhow::{Context, Result};
use dropcode_core::{Config, EventSink};
use dropcode_infra::AuditLogger;
use dropcode_services::{
    MimeResolver, StoreConfig, TransferService, TransferStore, UploadValidator, ValidationConfig,
};
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Build the transfer service around `events`. The store is opened (and
/// reconciled with the disk) here.
pub async fn build_state(config: &Config, events: Arc<dyn EventSink>) -> Result<Arc<AppState>> {
    let store = TransferStore::open_with_events(
        StoreConfig::new(config.data_dir().clone()),
        Arc::clone(&events),
    )
    .await
    .with_context(|| format!("Failed to open transfer store at {}", config.data_dir().display()))?;

    let validator = UploadValidator::new(ValidationConfig::from(config));
    let transfers = TransferService::new(store, validator, MimeResolver::new());

    Ok(Arc::new(AppState::new(transfers, events, config.clone())))
}

/// Production wiring: events go to the audit log file
pub async fn initialize_services(config: &Config) -> Result<(Arc<AppState>, JoinHandle<()>)> {
    let (audit, audit_task) = AuditLogger::spawn(config.audit_log_path().clone());
    tracing::info!(path = %config.audit_log_path().display(), "Audit log enabled");

    let state = build_state(config, Arc::new(audit)).await?;
    tracing::info!(
        data_dir = %config.data_dir().display(),
        transfers = state.transfers.store().session_count().await,
        "Transfer store ready"
    );

    Ok((state, audit_task))
}
