use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::code::TransferCode;

/// Coarse file classification used by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Archive,
    Audio,
    Video,
    Code,
    Font,
    Other,
}

/// Metadata for one stored file within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    /// Storage-safe name; also the artifact's file name on disk.
    pub name: String,
    /// Name as supplied by the uploader. Display only, never used as a path.
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub category: FileCategory,
    pub icon: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A transfer session as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferSession {
    pub code: TransferCode,
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
}

impl TransferSession {
    pub fn file(&self, name: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
