use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dropcode_core::{AppError, TransferAction, TransferEvent};
use dropcode_infra::ErrorResponse;
use dropcode_services::{BatchOutcome, TransportError, UploadCandidate};

use crate::constants::UPLOAD_FIELD;
use crate::error::{ApiResponse, HttpAppError};
use crate::handlers::parse_code;
use crate::state::AppState;
use crate::utils::ClientIp;

/// Upload one or more files (multipart field `files`)
///
/// The transfer is created on first upload. Files are admitted one by one;
/// the batch succeeds when at least one file was stored.
#[utoipa::path(
    post,
    path = "/api/transfers/{code}/files",
    tag = "transfers",
    params(("code" = String, Path, description = "Transfer code")),
    responses(
        (status = 200, description = "At least one file stored", body = ApiResponse<BatchOutcome>),
        (status = 400, description = "Malformed code or no files", body = ErrorResponse),
        (status = 422, description = "Every file rejected", body = ApiResponse<BatchOutcome>)
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let code = parse_code(&code)?;
    let candidates = read_candidates(&mut multipart).await?;
    if candidates.is_empty() {
        return Err(AppError::InvalidInput("No files were uploaded".to_string()).into());
    }

    let outcome = state.transfers.upload_batch(&code, candidates).await?;

    let client_ip = client_ip.into_inner();
    for error in &outcome.errors {
        state.emit(
            TransferEvent::new(TransferAction::UploadRejected)
                .with_client_ip(client_ip.clone())
                .with("code", code.as_str())
                .with("file", error.file.as_str())
                .with("reason", error.reason.as_str()),
        );
    }

    if outcome.is_success() {
        let message = if outcome.errors.is_empty() {
            format!("{} file(s) uploaded", outcome.uploaded)
        } else {
            format!(
                "{} file(s) uploaded, {} rejected",
                outcome.uploaded,
                outcome.errors.len()
            )
        };
        return Ok(ApiResponse::ok(message, outcome).into_response());
    }

    let body = ApiResponse::failure("No files were uploaded", "VALIDATION_FAILED", outcome);
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response())
}

fn transport_error_for(err: &MultipartError) -> TransportError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TransportError::ExceedsTransportLimit
    } else {
        TransportError::Partial
    }
}

fn stream_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::ValidationFailed {
            code: "exceeds_transport_limit",
            message: "Upload exceeds the request size limit".to_string(),
        }
    } else {
        AppError::InvalidInput(format!("Malformed upload: {}", err.body_text()))
    }
}

/// Collect `files` parts. Parts without a file name (an empty file input)
/// are skipped. A part that cannot be read fully becomes a failed
/// candidate and ends the stream.
async fn read_candidates(multipart: &mut Multipart) -> Result<Vec<UploadCandidate>, AppError> {
    let mut candidates = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if candidates.is_empty() => return Err(stream_error(e)),
            Err(e) => {
                tracing::warn!(error = %e, "Multipart stream ended early");
                break;
            }
        };

        let field_name = field.name().unwrap_or_default();
        if field_name != UPLOAD_FIELD && field_name != "files[]" {
            continue;
        }
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        match field.bytes().await {
            Ok(data) => candidates.push(UploadCandidate::new(file_name, data.into())),
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Upload part could not be read");
                candidates.push(UploadCandidate::failed(file_name, transport_error_for(&e)));
                break;
            }
        }
    }

    Ok(candidates)
}
