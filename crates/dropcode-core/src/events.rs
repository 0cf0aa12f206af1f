//! Transfer events and the observer hook they are emitted to
//!
//! The store and the transfer service report every mutation (successful or
//! not) as a [`TransferEvent`]. Whatever consumes them (the audit logger in
//! production) sits behind [`EventSink`], which is synchronous and infallible
//! from the caller's point of view: emitting must never block or fail a store
//! operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Action names as they appear in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferAction {
    CodeGenerated,
    SessionCreated,
    FileUploaded,
    UploadRejected,
    FileDeleted,
    TransferDeleted,
    DeleteFailed,
    FilesFetched,
    FileDownloaded,
    DownloadAll,
}

impl TransferAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::CodeGenerated => "CODE_GENERATED",
            TransferAction::SessionCreated => "SESSION_CREATED",
            TransferAction::FileUploaded => "FILE_UPLOADED",
            TransferAction::UploadRejected => "UPLOAD_REJECTED",
            TransferAction::FileDeleted => "FILE_DELETED",
            TransferAction::TransferDeleted => "TRANSFER_DELETED",
            TransferAction::DeleteFailed => "DELETE_FAILED",
            TransferAction::FilesFetched => "FILES_FETCHED",
            TransferAction::FileDownloaded => "FILE_DOWNLOADED",
            TransferAction::DownloadAll => "DOWNLOAD_ALL",
        }
    }
}

/// Structured record of one store-level or request-level action.
#[derive(Debug, Clone, Serialize)]
pub struct TransferEvent {
    pub timestamp: DateTime<Utc>,
    pub action: TransferAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    pub details: Map<String, JsonValue>,
}

impl TransferEvent {
    pub fn new(action: TransferAction) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            success: true,
            client_ip: None,
            details: Map::new(),
        }
    }

    /// Add one detail field
    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// Mark as failure and record the error message under `error`
    pub fn with_failure(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.details
            .insert("error".to_string(), JsonValue::String(error_message.into()));
        self
    }
}

/// Observer for transfer events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

/// Sink that drops every event.
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: TransferEvent) {}
}
