use std::path::{Path, PathBuf};

use dropcode_core::constants::{METADATA_FILE_NAME, STAGING_DIR_NAME, UPLOADS_DIR_NAME};
use dropcode_core::TransferCode;

/// On-disk layout of a transfer store rooted at `data_dir`:
///
/// ```text
/// <data_dir>/transfers.json
/// <data_dir>/uploads/<CODE>/<name>
/// <data_dir>/staging/
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE_NAME)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR_NAME)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join(STAGING_DIR_NAME)
    }

    pub fn session_dir(&self, code: &TransferCode) -> PathBuf {
        self.uploads_dir().join(code.as_str())
    }

    pub fn artifact_path(&self, code: &TransferCode, name: &str) -> PathBuf {
        self.session_dir(code).join(name)
    }

    /// Unique path inside the staging area
    pub fn staging_path(&self, suffix: &str) -> PathBuf {
        self.staging_dir()
            .join(format!("{}.{}", uuid::Uuid::new_v4(), suffix))
    }

    pub fn root(&self) -> &Path {
        &self.data_dir
    }
}

/// A storage name may only ever name a file directly inside a session
/// directory.
pub fn is_safe_storage_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}
