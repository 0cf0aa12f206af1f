//! HTTP response envelopes and error conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Service
//! results carry `AppError`, so `?` works on them directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dropcode_core::{AppError, ErrorMetadata, LogLevel};
use dropcode_infra::ErrorResponse;
use serde::Serialize;
use utoipa::ToSchema;

/// Success envelope shared by the JSON endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            data,
        }
    }

    /// Failure that still carries a payload, e.g. the per-file errors of a
    /// rejected batch
    pub fn failure(message: impl Into<String>, error_code: impl Into<String>, data: T) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: Some(error_code.into()),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Wrapper type for AppError to implement IntoResponse (orphan rule: both
/// the trait and `AppError` are foreign to this crate)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Request failed");
        }
    }
}

static CACHED_IS_PRODUCTION: std::sync::LazyLock<bool> = std::sync::LazyLock::new(|| {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| {
            let env = env.to_lowercase();
            env == "production" || env == "prod"
        })
        .unwrap_or(false)
});

/// Build the JSON body for an error; details are hidden in production and
/// for sensitive errors
pub fn error_body(error: &AppError, is_production: bool) -> ErrorResponse {
    let mut body = ErrorResponse::new(error.client_message(), error.error_code());
    body.suggested_action = error.suggested_action().map(String::from);
    if !is_production && !error.is_sensitive() {
        body.details = Some(error.detailed_message());
        body.error_type = Some(error.error_type().to_string());
    }
    body
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, *CACHED_IS_PRODUCTION))).into_response()
    }
}
