//! Error types module
//!
//! All failures that can reach a caller of the transfer service are unified
//! under [`AppError`]. Crate-local errors (storage, validation) convert into
//! it, and the HTTP layer renders it using the [`ErrorMetadata`] trait.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable issues
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SESSION_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether the request can be retried as-is
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid transfer code format: {0}")]
    InvalidCodeFormat(String),

    #[error("Transfer not found: {0}")]
    SessionNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Upload rejected; `code` is the stable sub-reason (e.g. "extension_blocked")
    #[error("Validation failed ({code}): {message}")]
    ValidationFailed { code: &'static str, message: String },

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("Could not allocate a unique transfer code after {attempts} attempts")]
    CapacityExhausted { attempts: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::IoFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidCodeFormat(_) => (
            400,
            "INVALID_CODE_FORMAT",
            false,
            Some("Codes are 6 characters: letters A-Z except I and O, digits 2-9"),
            false,
            LogLevel::Debug,
        ),
        AppError::SessionNotFound(_) => (
            404,
            "SESSION_NOT_FOUND",
            false,
            Some("Check the transfer code"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileNotFound(_) => (
            404,
            "FILE_NOT_FOUND",
            false,
            Some("Refresh the file list"),
            false,
            LogLevel::Debug,
        ),
        AppError::ValidationFailed { .. } => (
            422,
            "VALIDATION_FAILED",
            false,
            Some("Check file type and size"),
            false,
            LogLevel::Debug,
        ),
        AppError::IoFailure(_) => (
            500,
            "IO_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::CapacityExhausted { .. } => (
            503,
            "CAPACITY_EXHAUSTED",
            true,
            Some("Retry later"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidCodeFormat(_) => "InvalidCodeFormat",
            AppError::SessionNotFound(_) => "SessionNotFound",
            AppError::FileNotFound(_) => "FileNotFound",
            AppError::ValidationFailed { .. } => "ValidationFailed",
            AppError::IoFailure(_) => "IoFailure",
            AppError::CapacityExhausted { .. } => "CapacityExhausted",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidCodeFormat(_) => "Invalid transfer code format".to_string(),
            AppError::SessionNotFound(code) => format!("Transfer {} not found", code),
            AppError::FileNotFound(what) => format!("File not found: {}", what),
            AppError::ValidationFailed { message, .. } => message.clone(),
            AppError::IoFailure(_) => "Failed to access storage".to_string(),
            AppError::CapacityExhausted { .. } => {
                "No transfer code available right now".to_string()
            }
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
