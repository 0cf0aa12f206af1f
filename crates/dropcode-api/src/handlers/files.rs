use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use dropcode_core::{AppError, FileRecord, TransferAction, TransferEvent};
use dropcode_infra::ErrorResponse;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio_util::io::ReaderStream;

use crate::error::{ApiResponse, HttpAppError};
use crate::handlers::parse_code;
use crate::state::AppState;
use crate::utils::ClientIp;

/// `Content-Disposition` for a download: a quoted ASCII fallback plus the
/// exact name as RFC 5987 `filename*`
pub(crate) fn attachment_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(file_name, NON_ALPHANUMERIC)
    )
}

/// Download one file under its original name
#[utoipa::path(
    get,
    path = "/api/transfers/{code}/files/{name}",
    tag = "transfers",
    params(
        ("code" = String, Path, description = "Transfer code"),
        ("name" = String, Path, description = "Storage name of the file")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Transfer or file not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code, file = %name))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    Path((code, name)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let code = parse_code(&code)?;
    let (record, path) = state.transfers.file_for_download(&code, &name).await?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::FileNotFound(name.clone())
        } else {
            tracing::error!(error = %e, path = %path.display(), "Failed to open stored file");
            AppError::from(e)
        }
    })?;
    let length = file.metadata().await.map_err(AppError::from)?.len();

    state.emit(
        TransferEvent::new(TransferAction::FileDownloaded)
            .with_client_ip(client_ip.into_inner())
            .with("code", code.as_str())
            .with("file", record.original_name.as_str()),
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.mime_type.as_str())
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&record.original_name),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Remove one file from a transfer
#[utoipa::path(
    delete,
    path = "/api/transfers/{code}/files/{name}",
    tag = "transfers",
    params(
        ("code" = String, Path, description = "Transfer code"),
        ("name" = String, Path, description = "Storage name of the file")
    ),
    responses(
        (status = 200, description = "File removed", body = ApiResponse<FileRecord>),
        (status = 404, description = "Transfer or file not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code, file = %name))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((code, name)): Path<(String, String)>,
) -> Result<ApiResponse<FileRecord>, HttpAppError> {
    let code = parse_code(&code)?;
    let record = state.transfers.remove_file(&code, &name).await?;
    Ok(ApiResponse::ok("File deleted", record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_keeps_plain_names() {
        assert_eq!(
            attachment_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report%2Epdf"
        );
    }

    #[test]
    fn test_disposition_escapes_quotes_and_unicode() {
        let value = attachment_disposition("my \"café\".txt");
        assert!(value.starts_with("attachment; filename=\"my _caf__.txt\""));
        assert!(value.contains("caf%C3%A9"));
    }
}
