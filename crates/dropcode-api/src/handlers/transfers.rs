use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use dropcode_core::{
    format_file_size, FileRecord, TransferAction, TransferCode, TransferEvent, TransferSession,
};
use dropcode_infra::ErrorResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiResponse, HttpAppError};
use crate::handlers::parse_code;
use crate::state::AppState;
use crate::utils::ClientIp;

/// A stored file as listed to receivers
#[derive(Debug, Serialize, ToSchema)]
pub struct FileView {
    #[serde(flatten)]
    pub file: FileRecord,
    /// Human-readable size, e.g. "1.50 MB"
    pub size_formatted: String,
}

impl From<FileRecord> for FileView {
    fn from(file: FileRecord) -> Self {
        let size_formatted = format_file_size(file.size);
        Self {
            file,
            size_formatted,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferView {
    pub code: TransferCode,
    /// Absent when no transfer exists under the code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub file_count: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub files: Vec<FileView>,
}

impl TransferView {
    fn new(code: TransferCode, session: Option<TransferSession>) -> Self {
        let (created_at, files) = match session {
            Some(session) => (Some(session.created_at), session.files),
            None => (None, Vec::new()),
        };
        let total_size = files.iter().map(|f| f.size).sum();
        Self {
            code,
            created_at,
            file_count: files.len(),
            total_size,
            total_size_formatted: format_file_size(total_size),
            files: files.into_iter().map(FileView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedTransfer {
    pub code: TransferCode,
    pub files_removed: usize,
}

/// List the files of a transfer. An unknown code yields an empty list.
#[utoipa::path(
    get,
    path = "/api/transfers/{code}",
    tag = "transfers",
    params(("code" = String, Path, description = "Transfer code")),
    responses(
        (status = 200, description = "Transfer contents", body = ApiResponse<TransferView>),
        (status = 400, description = "Malformed code", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    Path(code): Path<String>,
) -> Result<ApiResponse<TransferView>, HttpAppError> {
    let code = parse_code(&code)?;
    let session = state.transfers.get_session(&code).await;
    let view = TransferView::new(code, session);

    state.emit(
        TransferEvent::new(TransferAction::FilesFetched)
            .with_client_ip(client_ip.into_inner())
            .with("code", view.code.as_str())
            .with("count", view.file_count),
    );

    let message = format!("{} file(s) found", view.file_count);
    Ok(ApiResponse::ok(message, view))
}

/// Delete a transfer with all of its files
#[utoipa::path(
    delete,
    path = "/api/transfers/{code}",
    tag = "transfers",
    params(("code" = String, Path, description = "Transfer code")),
    responses(
        (status = 200, description = "Transfer deleted", body = ApiResponse<DeletedTransfer>),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn delete_transfer(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<ApiResponse<DeletedTransfer>, HttpAppError> {
    let code = parse_code(&code)?;
    let removed = state.transfers.delete_session(&code).await?;

    Ok(ApiResponse::ok(
        "Transfer deleted",
        DeletedTransfer {
            code,
            files_removed: removed.files.len(),
        },
    ))
}
