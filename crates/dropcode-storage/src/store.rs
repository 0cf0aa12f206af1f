//! Transfer store
//!
//! The authoritative map from transfer code to session metadata, and the
//! only component that touches `uploads/` and `staging/`.
//!
//! Every mutation holds the write guard for its whole read-modify-write:
//! the in-memory map, the disk artifact and the document rewrite. A change
//! to the map is rolled back if the document cannot be persisted, so the
//! map never runs ahead of disk. Mutations run on their own task; a caller
//! that gives up waiting does not interrupt them halfway.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use dropcode_core::{
    EventSink, FileCategory, FileRecord, NoOpEventSink, TransferAction, TransferCode,
    TransferEvent, TransferSession,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::document::{self, SessionMap, StoredSession};
use crate::error::{StorageError, StorageResult};
use crate::layout::{is_safe_storage_name, StoreConfig};
use crate::reconcile::{reconcile, ReconcileReport};

/// A validated upload ready to be written, named and classified by the
/// caller.
#[derive(Debug, Clone)]
pub struct AdmittedFile {
    /// Storage name; becomes the artifact's file name
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub category: FileCategory,
    pub icon: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct TransferStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    sessions: RwLock<SessionMap>,
    events: Arc<dyn EventSink>,
}

impl TransferStore {
    /// Open (or initialise) the store under `config.data_dir`, repairing
    /// any disagreement between disk and the metadata document.
    pub async fn open(config: StoreConfig) -> StorageResult<Self> {
        Self::open_with_events(config, Arc::new(NoOpEventSink)).await
    }

    pub async fn open_with_events(
        config: StoreConfig,
        events: Arc<dyn EventSink>,
    ) -> StorageResult<Self> {
        fs::create_dir_all(config.root()).await.map_err(StorageError::io(format!(
            "Failed to create data directory {}",
            config.root().display()
        )))?;

        let metadata_path = config.metadata_path();
        let mut sessions = document::load(&metadata_path).await?;
        let report = reconcile(&config, &mut sessions).await?;
        if report.metadata_changed() {
            document::write_atomic(&metadata_path, &sessions).await?;
        }
        log_report(&report);

        tracing::info!(
            data_dir = %config.root().display(),
            sessions = sessions.len(),
            "Transfer store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                sessions: RwLock::new(sessions),
                events,
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Run a mutation to completion on its own task.
    async fn run_mutation<T, F, Fut>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce(Arc<StoreInner>) -> Fut,
        Fut: Future<Output = StorageResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(op(inner))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    /// Create the session if absent; an existing session is left untouched.
    pub async fn create_session(&self, code: &TransferCode) -> StorageResult<()> {
        self.reserve_session(code).await.map(|_| ())
    }

    /// Like [`create_session`](Self::create_session), reporting whether this
    /// call created the session.
    pub async fn reserve_session(&self, code: &TransferCode) -> StorageResult<bool> {
        let code = code.clone();
        self.run_mutation(move |inner| async move { inner.reserve_session(code).await })
            .await
    }

    pub async fn get_session(&self, code: &TransferCode) -> Option<TransferSession> {
        let sessions = self.inner.sessions.read().await;
        sessions.get(code).map(|s| s.to_view(code))
    }

    pub async fn contains(&self, code: &TransferCode) -> bool {
        self.inner.sessions.read().await.contains_key(code)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Write the artifact and append its record as one unit.
    pub async fn add_file(&self, code: &TransferCode, file: AdmittedFile) -> StorageResult<FileRecord> {
        let code = code.clone();
        self.run_mutation(move |inner| async move { inner.add_file(code, file).await })
            .await
    }

    /// Remove one record and its artifact. A record whose artifact is
    /// already gone is still removed.
    pub async fn remove_file(&self, code: &TransferCode, name: &str) -> StorageResult<FileRecord> {
        let code = code.clone();
        let name = name.to_string();
        self.run_mutation(move |inner| async move { inner.remove_file(code, name).await })
            .await
    }

    /// Remove the session's directory tree and its metadata entry.
    pub async fn delete_session(&self, code: &TransferCode) -> StorageResult<TransferSession> {
        let code = code.clone();
        self.run_mutation(move |inner| async move { inner.delete_session(code).await })
            .await
    }

    /// Path of a recorded artifact; `None` when the session or the record
    /// does not exist.
    pub async fn artifact_path(&self, code: &TransferCode, name: &str) -> Option<PathBuf> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(code)
            .and_then(|s| s.position(name))
            .map(|_| self.inner.config.artifact_path(code, name))
    }
}

fn log_report(report: &ReconcileReport) {
    if *report != ReconcileReport::default() {
        tracing::warn!(
            dropped_records = report.dropped_records,
            resized_records = report.resized_records,
            removed_strays = report.removed_strays,
            removed_orphan_dirs = report.removed_orphan_dirs,
            recreated_dirs = report.recreated_dirs,
            cleared_staging = report.cleared_staging,
            "Transfer store repaired on open"
        );
    }
}

async fn remove_quietly(path: &Path, is_dir: bool) {
    let result = if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged entry");
        }
    }
}

/// Rename `from` to `to`; `Ok(false)` when `from` does not exist.
async fn rename_if_exists(from: &Path, to: &Path) -> StorageResult<bool> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io {
            context: format!("Failed to stage {}", from.display()),
            source: e,
        }),
    }
}

impl StoreInner {
    async fn persist(&self, sessions: &SessionMap) -> StorageResult<()> {
        document::write_atomic(&self.config.metadata_path(), sessions).await
    }

    fn emit(&self, event: TransferEvent) {
        self.events.emit(event);
    }

    async fn reserve_session(&self, code: TransferCode) -> StorageResult<bool> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&code) {
            return Ok(false);
        }

        let dir = self.config.session_dir(&code);
        fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::io(format!("Failed to create {}", dir.display())))?;

        sessions.insert(code.clone(), StoredSession::new());
        if let Err(e) = self.persist(&sessions).await {
            sessions.remove(&code);
            let _ = fs::remove_dir(&dir).await;
            tracing::error!(code = %code, error = %e, "Failed to persist new session");
            return Err(e);
        }

        tracing::info!(code = %code, "Transfer session created");
        self.emit(TransferEvent::new(TransferAction::SessionCreated).with("code", code.as_str()));
        Ok(true)
    }

    async fn add_file(&self, code: TransferCode, file: AdmittedFile) -> StorageResult<FileRecord> {
        if !is_safe_storage_name(&file.name) {
            return Err(StorageError::InvalidName(file.name));
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get(&code)
            .ok_or_else(|| StorageError::SessionNotFound(code.to_string()))?;

        let dir = self.config.session_dir(&code);
        let target = dir.join(&file.name);
        if session.position(&file.name).is_some() || fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::NameConflict {
                code: code.to_string(),
                name: file.name,
            });
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::io(format!("Failed to create {}", dir.display())))?;
        let staged = self.config.staging_path("part");
        let written = write_staged(&staged, &file.data, &target).await;
        if let Err(e) = written {
            remove_quietly(&staged, false).await;
            return Err(e);
        }

        let record = FileRecord {
            name: file.name,
            original_name: file.original_name,
            size: file.data.len() as u64,
            mime_type: file.mime_type,
            category: file.category,
            icon: file.icon,
            uploaded_at: Utc::now(),
        };

        if let Some(session) = sessions.get_mut(&code) {
            session.files.push(record.clone());
        }
        if let Err(e) = self.persist(&sessions).await {
            if let Some(session) = sessions.get_mut(&code) {
                session.files.pop();
            }
            remove_quietly(&target, false).await;
            tracing::error!(code = %code, file = %record.name, error = %e, "Failed to persist uploaded file");
            return Err(e);
        }

        tracing::info!(
            code = %code,
            file = %record.name,
            size_bytes = record.size,
            mime_type = %record.mime_type,
            "File stored"
        );
        self.emit(
            TransferEvent::new(TransferAction::FileUploaded)
                .with("code", code.as_str())
                .with("file", record.original_name.as_str())
                .with("stored_as", record.name.as_str())
                .with("size", record.size)
                .with("type", record.mime_type.as_str()),
        );
        Ok(record)
    }

    async fn remove_file(&self, code: TransferCode, name: String) -> StorageResult<FileRecord> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&code)
            .ok_or_else(|| StorageError::SessionNotFound(code.to_string()))?;
        let index = session.position(&name).ok_or_else(|| StorageError::FileNotFound {
            code: code.to_string(),
            name: name.clone(),
        })?;

        let target = self.config.artifact_path(&code, &name);
        let staged = self.config.staging_path("del");
        let had_artifact = match rename_if_exists(&target, &staged).await {
            Ok(had) => had,
            Err(e) => {
                self.emit_delete_failed(&code, Some(&name), &e);
                return Err(e);
            }
        };
        if !had_artifact {
            tracing::warn!(code = %code, file = %name, "Artifact already absent on remove");
        }

        let record = session.files.remove(index);
        if let Err(e) = self.persist(&sessions).await {
            if let Some(session) = sessions.get_mut(&code) {
                session.files.insert(index, record);
            }
            if had_artifact {
                let _ = fs::rename(&staged, &target).await;
            }
            self.emit_delete_failed(&code, Some(&name), &e);
            return Err(e);
        }

        if had_artifact {
            remove_quietly(&staged, false).await;
        }

        tracing::info!(code = %code, file = %name, "File removed");
        self.emit(
            TransferEvent::new(TransferAction::FileDeleted)
                .with("code", code.as_str())
                .with("file", record.original_name.as_str()),
        );
        Ok(record)
    }

    async fn delete_session(&self, code: TransferCode) -> StorageResult<TransferSession> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&code) {
            return Err(StorageError::SessionNotFound(code.to_string()));
        }

        let dir = self.config.session_dir(&code);
        let staged = self.config.staging_path("del");
        let had_dir = match rename_if_exists(&dir, &staged).await {
            Ok(had) => had,
            Err(e) => {
                self.emit_delete_failed(&code, None, &e);
                return Err(e);
            }
        };

        let Some(removed) = sessions.remove(&code) else {
            return Err(StorageError::SessionNotFound(code.to_string()));
        };
        if let Err(e) = self.persist(&sessions).await {
            sessions.insert(code.clone(), removed);
            if had_dir {
                let _ = fs::rename(&staged, &dir).await;
            }
            self.emit_delete_failed(&code, None, &e);
            return Err(e);
        }

        if had_dir {
            remove_quietly(&staged, true).await;
        }

        tracing::info!(code = %code, files = removed.files.len(), "Transfer deleted");
        self.emit(
            TransferEvent::new(TransferAction::TransferDeleted)
                .with("code", code.as_str())
                .with("file_count", removed.files.len()),
        );
        Ok(removed.to_view(&code))
    }

    fn emit_delete_failed(&self, code: &TransferCode, file: Option<&str>, error: &StorageError) {
        tracing::error!(code = %code, file = ?file, error = %error, "Delete failed");
        let mut event = TransferEvent::new(TransferAction::DeleteFailed).with("code", code.as_str());
        if let Some(file) = file {
            event = event.with("file", file);
        }
        self.emit(event.with_failure(error.to_string()));
    }
}

/// Write `data` to `staged`, fsync, then move it to `target`.
async fn write_staged(staged: &Path, data: &[u8], target: &Path) -> StorageResult<()> {
    let mut file = fs::File::create(staged)
        .await
        .map_err(StorageError::io(format!("Failed to create {}", staged.display())))?;
    file.write_all(data)
        .await
        .map_err(StorageError::io(format!("Failed to write {}", staged.display())))?;
    file.sync_all()
        .await
        .map_err(StorageError::io(format!("Failed to sync {}", staged.display())))?;
    drop(file);
    fs::rename(staged, target)
        .await
        .map_err(StorageError::io(format!("Failed to move file into {}", target.display())))
}
