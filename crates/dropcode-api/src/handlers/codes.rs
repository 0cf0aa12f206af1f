use std::sync::Arc;

use axum::extract::State;
use dropcode_core::{TransferAction, TransferCode, TransferEvent};
use dropcode_infra::ErrorResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::ClientIp;

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedCode {
    pub code: TransferCode,
}

/// Allocate a fresh code and open an empty transfer under it
#[utoipa::path(
    post,
    path = "/api/codes",
    tag = "transfers",
    responses(
        (status = 200, description = "Code generated", body = ApiResponse<GeneratedCode>),
        (status = 503, description = "No free code found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn generate_code(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
) -> Result<ApiResponse<GeneratedCode>, HttpAppError> {
    let code = state.transfers.generate_code().await?;

    state.emit(
        TransferEvent::new(TransferAction::CodeGenerated)
            .with_client_ip(client_ip.into_inner())
            .with("code", code.as_str()),
    );
    tracing::info!(code = %code, "Transfer code generated");

    Ok(ApiResponse::ok("Transfer code generated", GeneratedCode { code }))
}
