//! Startup repair of disk state against the metadata document
//!
//! After a crash the two can disagree: an artifact may be missing for a
//! record, a file may have been written without its record, a staged delete
//! may not have been cleaned up. The store owns `uploads/` and `staging/`
//! outright, so anything there that the document does not account for is
//! removed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use dropcode_core::TransferCode;
use tokio::fs;

use crate::document::{is_document_temp, SessionMap};
use crate::error::{StorageError, StorageResult};
use crate::layout::StoreConfig;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dropped_records: usize,
    pub resized_records: usize,
    pub removed_strays: usize,
    pub removed_orphan_dirs: usize,
    pub recreated_dirs: usize,
    pub cleared_staging: usize,
}

impl ReconcileReport {
    /// Whether the in-memory document differs from what was loaded
    pub fn metadata_changed(&self) -> bool {
        self.dropped_records > 0 || self.resized_records > 0
    }
}

async fn remove_entry(path: &Path, is_dir: bool) -> StorageResult<()> {
    let result = if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io {
            context: format!("Failed to remove {}", path.display()),
            source: e,
        }),
    }
}

async fn clear_staging(config: &StoreConfig) -> StorageResult<usize> {
    let staging = config.staging_dir();
    let mut entries = fs::read_dir(&staging)
        .await
        .map_err(StorageError::io(format!("Failed to list {}", staging.display())))?;
    let mut cleared = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(StorageError::io("Failed to read staging entry"))?
    {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        remove_entry(&entry.path(), is_dir).await?;
        cleared += 1;
    }
    Ok(cleared)
}

async fn remove_document_temps(config: &StoreConfig) -> StorageResult<()> {
    let metadata_path = config.metadata_path();
    let document_name = metadata_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut entries = fs::read_dir(config.root())
        .await
        .map_err(StorageError::io(format!("Failed to list {}", config.root().display())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(StorageError::io("Failed to read data directory entry"))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_document_temp(&name, &document_name) {
            tracing::warn!(file = %name, "Removing leftover metadata temp file");
            remove_entry(&entry.path(), false).await?;
        }
    }
    Ok(())
}

async fn reconcile_session(
    config: &StoreConfig,
    code: &TransferCode,
    files: &mut Vec<dropcode_core::FileRecord>,
    report: &mut ReconcileReport,
) -> StorageResult<()> {
    let dir = config.session_dir(code);
    if !fs::try_exists(&dir).await.unwrap_or(false) {
        tracing::warn!(code = %code, "Recreating missing session directory");
        fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::io(format!("Failed to create {}", dir.display())))?;
        report.recreated_dirs += 1;
    }

    // Regular files present on disk, with their sizes and paths
    let mut on_disk: HashMap<String, (u64, PathBuf)> = HashMap::new();
    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(StorageError::io(format!("Failed to list {}", dir.display())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(StorageError::io("Failed to read session entry"))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(StorageError::io("Failed to stat session entry"))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                // No record can name it, so it is always a stray
                tracing::warn!(code = %code, entry = ?raw, "Removing entry with non-UTF-8 name");
                remove_entry(&entry.path(), file_type.is_dir()).await?;
                report.removed_strays += 1;
                continue;
            }
        };
        if file_type.is_file() {
            let len = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            on_disk.insert(name, (len, entry.path()));
        } else {
            tracing::warn!(code = %code, entry = %name, "Removing non-regular entry from session directory");
            remove_entry(&entry.path(), file_type.is_dir()).await?;
            report.removed_strays += 1;
        }
    }

    let mut seen = HashSet::new();
    files.retain_mut(|record| {
        let Some(&(len, _)) = on_disk.get(&record.name) else {
            tracing::warn!(code = %code, file = %record.name, "Dropping record without artifact");
            report.dropped_records += 1;
            return false;
        };
        if !seen.insert(record.name.clone()) {
            tracing::warn!(code = %code, file = %record.name, "Dropping duplicate record");
            report.dropped_records += 1;
            return false;
        }
        if record.size != len {
            tracing::warn!(
                code = %code,
                file = %record.name,
                recorded = record.size,
                actual = len,
                "Correcting recorded size"
            );
            record.size = len;
            report.resized_records += 1;
        }
        true
    });

    for (name, (_, path)) in on_disk.iter().filter(|(name, _)| !seen.contains(*name)) {
        tracing::warn!(code = %code, file = %name, "Removing artifact without record");
        remove_entry(path, false).await?;
        report.removed_strays += 1;
    }

    Ok(())
}

async fn remove_orphan_dirs(
    config: &StoreConfig,
    sessions: &SessionMap,
    report: &mut ReconcileReport,
) -> StorageResult<()> {
    let uploads = config.uploads_dir();
    let mut entries = fs::read_dir(&uploads)
        .await
        .map_err(StorageError::io(format!("Failed to list {}", uploads.display())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(StorageError::io("Failed to read uploads entry"))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        let known = entry.file_name().to_str().is_some_and(|raw| {
            TransferCode::parse(raw)
                .map(|code| code.as_str() == raw && sessions.contains_key(&code))
                .unwrap_or(false)
        });
        if known {
            continue;
        }
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        tracing::warn!(entry = %name, "Removing uploads entry with no session");
        remove_entry(&entry.path(), is_dir).await?;
        report.removed_orphan_dirs += 1;
    }
    Ok(())
}

/// Bring `uploads/` and `staging/` in line with `sessions`, editing
/// `sessions` where records point at missing artifacts.
pub async fn reconcile(config: &StoreConfig, sessions: &mut SessionMap) -> StorageResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for dir in [config.uploads_dir(), config.staging_dir()] {
        fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::io(format!("Failed to create {}", dir.display())))?;
    }

    report.cleared_staging = clear_staging(config).await?;
    if report.cleared_staging > 0 {
        tracing::warn!(entries = report.cleared_staging, "Cleared interrupted staging entries");
    }
    remove_document_temps(config).await?;

    for (code, session) in sessions.iter_mut() {
        reconcile_session(config, code, &mut session.files, &mut report).await?;
    }

    remove_orphan_dirs(config, sessions, &mut report).await?;

    Ok(report)
}
