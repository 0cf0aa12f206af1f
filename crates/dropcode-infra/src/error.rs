//! HTTP error response body
//!
//! The `IntoResponse` implementation for `AppError` lives in the API crate
//! (orphan rule: neither the trait nor the type is local here).

use serde::Serialize;
use utoipa::ToSchema;

/// Error body returned by every endpoint; `success` is always `false`
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Machine-readable code, e.g. `SESSION_NOT_FOUND`
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: error_code.into(),
            suggested_action: None,
            details: None,
            error_type: None,
        }
    }
}
