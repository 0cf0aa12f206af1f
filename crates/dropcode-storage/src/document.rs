//! The metadata document: every session, serialized as one JSON object
//! keyed by code and replaced wholesale on each mutation.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use dropcode_core::{FileRecord, TransferCode, TransferSession};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl StoredSession {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            files: Vec::new(),
        }
    }

    pub fn to_view(&self, code: &TransferCode) -> TransferSession {
        TransferSession {
            code: code.clone(),
            created_at: self.created_at,
            files: self.files.clone(),
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|f| f.name == name)
    }
}

impl Default for StoredSession {
    fn default() -> Self {
        Self::new()
    }
}

pub type SessionMap = BTreeMap<TransferCode, StoredSession>;

/// Read the document; a missing or blank file is an empty store.
pub async fn load(path: &Path) -> StorageResult<SessionMap> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SessionMap::new()),
        Err(e) => {
            return Err(StorageError::Io {
                context: format!("Failed to read {}", path.display()),
                source: e,
            })
        }
    };

    if contents.trim().is_empty() {
        return Ok(SessionMap::new());
    }

    Ok(serde_json::from_str(&contents)?)
}

/// Replace the document atomically: write a sibling temp file, fsync it,
/// then rename it over the target.
pub async fn write_atomic(path: &Path, sessions: &SessionMap) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(sessions)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Document(format!("Bad document path {}", path.display())))?;
    let tmp_path = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(StorageError::io(format!("Failed to create {}", tmp_path.display())))?;
        file.write_all(&json)
            .await
            .map_err(StorageError::io(format!("Failed to write {}", tmp_path.display())))?;
        file.sync_all()
            .await
            .map_err(StorageError::io(format!("Failed to sync {}", tmp_path.display())))?;
        drop(file);
        fs::rename(&tmp_path, path)
            .await
            .map_err(StorageError::io(format!("Failed to replace {}", path.display())))
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

/// Whether `name` is a temp file left behind by [`write_atomic`].
pub fn is_document_temp(name: &str, document_name: &str) -> bool {
    name.starts_with(&format!("{}.", document_name)) && name.ends_with(".tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let dir = tempdir().unwrap();
        let sessions = load(&dir.path().join("transfers.json")).await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transfers.json");
        let mut sessions = SessionMap::new();
        sessions.insert(TransferCode::parse("AB3456").unwrap(), StoredSession::new());

        write_atomic(&path, &sessions).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded, sessions);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["AB3456"]["files"].is_array());
    }

    #[tokio::test]
    async fn test_no_temp_files_left() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transfers.json");
        for _ in 0..3 {
            write_atomic(&path, &SessionMap::new()).await.unwrap();
        }
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["transfers.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_document_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transfers.json");
        std::fs::write(&path, "{\"bad code\": {}}").unwrap();
        assert!(matches!(load(&path).await, Err(StorageError::Document(_))));
    }

    #[test]
    fn test_is_document_temp() {
        assert!(is_document_temp("transfers.json.1234.tmp", "transfers.json"));
        assert!(!is_document_temp("transfers.json", "transfers.json"));
        assert!(!is_document_temp("other.tmp", "transfers.json"));
    }
}
