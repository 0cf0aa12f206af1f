use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use dropcode_core::{AppError, TransferAction, TransferEvent};
use dropcode_infra::ErrorResponse;

use crate::error::HttpAppError;
use crate::handlers::files::attachment_disposition;
use crate::handlers::parse_code;
use crate::state::AppState;
use crate::utils::ClientIp;

/// Download every file of a transfer as `files_<CODE>.zip`
#[utoipa::path(
    get,
    path = "/api/transfers/{code}/archive",
    tag = "transfers",
    params(("code" = String, Path, description = "Transfer code")),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "Transfer not found or empty", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    Path(code): Path<String>,
) -> Result<Response, HttpAppError> {
    let code = parse_code(&code)?;
    let archive = state.transfers.build_archive(&code).await?;

    state.emit(
        TransferEvent::new(TransferAction::DownloadAll)
            .with_client_ip(client_ip.into_inner())
            .with("code", code.as_str())
            .with("count", archive.file_count),
    );
    tracing::info!(
        files = archive.file_count,
        bytes = archive.data.len(),
        "Archive built"
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&archive.file_name),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(archive.data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
