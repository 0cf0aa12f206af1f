use dropcode_core::AppError;
use thiserror::Error;

/// Transfer store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Transfer not found: {0}")]
    SessionNotFound(String),

    #[error("File {name} not found in transfer {code}")]
    FileNotFound { code: String, name: String },

    #[error("File {name} already exists in transfer {code}")]
    NameConflict { code: String, name: String },

    #[error("Invalid storage name: {0}")]
    InvalidName(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata document error: {0}")]
    Document(String),

    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> StorageError {
        let context = context.into();
        move |source| StorageError::Io { context, source }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Document(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SessionNotFound(code) => AppError::SessionNotFound(code),
            StorageError::FileNotFound { name, .. } => AppError::FileNotFound(name),
            StorageError::InvalidName(name) => {
                AppError::InvalidInput(format!("Invalid file name: {}", name))
            }
            StorageError::NameConflict { .. } | StorageError::TaskFailed(_) => {
                AppError::Internal(err.to_string())
            }
            StorageError::Io { .. } | StorageError::Document(_) => {
                AppError::IoFailure(err.to_string())
            }
        }
    }
}
