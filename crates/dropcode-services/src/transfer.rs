//! Transfer service
//!
//! The entry point for every transfer operation. Uploads go through the
//! validator, the sanitizer and the MIME resolver before the store sees
//! them; removals go straight to the store.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use dropcode_core::{AppError, ErrorMetadata, FileRecord, TransferCode, TransferSession};
use dropcode_processing::{
    category_for, icon_for, sanitize_filename, MimeResolver, UploadCandidate, UploadValidator,
};
use dropcode_storage::{AdmittedFile, StorageError, TransferStore};
use serde::Serialize;
use utoipa::ToSchema;

use crate::archive::{create_zip_archive, ArchiveEntry};
use crate::code_generator;

/// Storage names carry a random suffix; a clash means the same second and
/// the same 32 random bits, so a handful of retries is plenty.
const MAX_NAME_ATTEMPTS: usize = 3;

/// Why one file of a batch was not admitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FileError {
    /// Uploaded file name (base name only)
    pub file: String,
    /// Stable reason code, e.g. `extension_blocked`
    pub reason: String,
    pub message: String,
}

/// Result of a multi-file upload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchOutcome {
    pub uploaded: usize,
    pub files: Vec<FileRecord>,
    pub errors: Vec<FileError>,
}

impl BatchOutcome {
    /// A batch succeeds when at least one file was admitted
    pub fn is_success(&self) -> bool {
        self.uploaded > 0
    }
}

/// A ZIP of every file in a transfer
#[derive(Debug, Clone)]
pub struct TransferArchive {
    pub file_name: String,
    pub file_count: usize,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct TransferService {
    store: TransferStore,
    validator: Arc<UploadValidator>,
    mime: Arc<MimeResolver>,
}

impl TransferService {
    pub fn new(store: TransferStore, validator: UploadValidator, mime: MimeResolver) -> Self {
        Self {
            store,
            validator: Arc::new(validator),
            mime: Arc::new(mime),
        }
    }

    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    pub async fn generate_code(&self) -> Result<TransferCode, AppError> {
        code_generator::generate_code(&self.store).await
    }

    pub async fn create_session(&self, code: &TransferCode) -> Result<(), AppError> {
        Ok(self.store.create_session(code).await?)
    }

    pub async fn get_session(&self, code: &TransferCode) -> Option<TransferSession> {
        self.store.get_session(code).await
    }

    pub async fn add_file(
        &self,
        code: &TransferCode,
        original_name: &str,
        data: Vec<u8>,
    ) -> Result<FileRecord, AppError> {
        self.add_candidate(code, UploadCandidate::new(original_name, data))
            .await
    }

    /// Validate, name, classify and store one upload. The session must
    /// already exist.
    pub async fn add_candidate(
        &self,
        code: &TransferCode,
        candidate: UploadCandidate,
    ) -> Result<FileRecord, AppError> {
        if !self.store.contains(code).await {
            return Err(AppError::SessionNotFound(code.to_string()));
        }

        // Image decoding is CPU bound; keep it off the async workers.
        let validator = Arc::clone(&self.validator);
        let candidate =
            tokio::task::spawn_blocking(move || validator.validate(&candidate).map(|()| candidate))
                .await
                .map_err(|e| AppError::Internal(format!("Validation task failed: {}", e)))??;

        let original_name = candidate.display_name().to_string();
        let mime_type = self.mime.resolve(&candidate.data, &original_name);
        let category = category_for(&original_name);
        let icon = icon_for(&original_name).to_string();
        let data = Bytes::from(candidate.data);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let file = AdmittedFile {
                name: sanitize_filename(&original_name),
                original_name: original_name.clone(),
                mime_type: mime_type.clone(),
                category,
                icon: icon.clone(),
                data: data.clone(),
            };
            match self.store.add_file(code, file).await {
                Ok(record) => return Ok(record),
                Err(StorageError::NameConflict { name, .. }) if attempt < MAX_NAME_ATTEMPTS => {
                    tracing::debug!(code = %code, file = %name, "Storage name collision, renaming");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Upload several files under `code`, creating the session on first
    /// use. Per-file failures are collected; they do not stop the batch.
    pub async fn upload_batch(
        &self,
        code: &TransferCode,
        candidates: Vec<UploadCandidate>,
    ) -> Result<BatchOutcome, AppError> {
        self.store.create_session(code).await?;

        let mut files = Vec::new();
        let mut errors = Vec::new();
        for candidate in candidates {
            let file = candidate.display_name().to_string();
            match self.add_candidate(code, candidate).await {
                Ok(record) => files.push(record),
                Err(e) => {
                    tracing::info!(code = %code, file = %file, error = %e, "Upload rejected");
                    errors.push(FileError {
                        file,
                        reason: reason_code(&e),
                        message: e.client_message(),
                    });
                }
            }
        }

        tracing::info!(
            code = %code,
            uploaded = files.len(),
            rejected = errors.len(),
            "Batch upload finished"
        );

        Ok(BatchOutcome {
            uploaded: files.len(),
            files,
            errors,
        })
    }

    pub async fn remove_file(&self, code: &TransferCode, name: &str) -> Result<FileRecord, AppError> {
        Ok(self.store.remove_file(code, name).await?)
    }

    pub async fn delete_session(&self, code: &TransferCode) -> Result<TransferSession, AppError> {
        Ok(self.store.delete_session(code).await?)
    }

    /// Record and on-disk path of one file, for download
    pub async fn file_for_download(
        &self,
        code: &TransferCode,
        name: &str,
    ) -> Result<(FileRecord, PathBuf), AppError> {
        let session = self
            .store
            .get_session(code)
            .await
            .ok_or_else(|| AppError::SessionNotFound(code.to_string()))?;
        let record = session
            .file(name)
            .cloned()
            .ok_or_else(|| AppError::FileNotFound(name.to_string()))?;
        let path = self
            .store
            .artifact_path(code, name)
            .await
            .ok_or_else(|| AppError::FileNotFound(name.to_string()))?;
        Ok((record, path))
    }

    /// ZIP every file of the transfer under its original name
    pub async fn build_archive(&self, code: &TransferCode) -> Result<TransferArchive, AppError> {
        let session = self
            .store
            .get_session(code)
            .await
            .ok_or_else(|| AppError::SessionNotFound(code.to_string()))?;
        if session.is_empty() {
            return Err(AppError::FileNotFound(format!("transfer {} has no files", code)));
        }

        let entries: Vec<ArchiveEntry> = session
            .files
            .iter()
            .map(|f| ArchiveEntry {
                path: self.store.config().artifact_path(code, &f.name),
                display_name: f.original_name.clone(),
            })
            .collect();

        let data = tokio::task::spawn_blocking(move || create_zip_archive(&entries))
            .await
            .map_err(|e| AppError::Internal(format!("Archive task failed: {}", e)))??;

        Ok(TransferArchive {
            file_name: format!("files_{}.zip", code),
            file_count: session.files.len(),
            data,
        })
    }
}

fn reason_code(err: &AppError) -> String {
    match err {
        AppError::ValidationFailed { code, .. } => code.to_string(),
        other => other.error_code().to_lowercase(),
    }
}
