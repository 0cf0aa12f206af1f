//! Append-only audit log of transfer activity
//!
//! Events are queued on a bounded channel and written by a background task,
//! so emitting never blocks and a failing disk never fails a request. When
//! the queue is full the event is dropped with a warning.
//! Lines look like:
//!
//! ```text
//! [2025-01-31 14:02:11] [203.0.113.7] FILE_UPLOADED | {"code":"AB3456","file":"photo.png"}
//! ```

use std::path::{Path, PathBuf};

use dropcode_core::{EventSink, TransferEvent};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Placeholder for events that carry no client address
const NO_CLIENT_IP: &str = "-";

/// Events buffered ahead of the writer before new ones are dropped
pub const AUDIT_QUEUE_CAPACITY: usize = 4096;

#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::Sender<TransferEvent>,
}

impl AuditLogger {
    /// Start the writer task appending to `path`. The task exits once every
    /// clone of the returned logger has been dropped and the queue drained.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(path, AUDIT_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(path: impl Into<PathBuf>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_writer(path.into(), rx));
        (Self { tx }, handle)
    }
}

impl EventSink for AuditLogger {
    fn emit(&self, event: TransferEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(action = event.action.as_str(), "Audit queue full; event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Audit writer stopped; event dropped");
            }
        }
    }
}

/// Render one event as a log line (without trailing newline)
pub fn format_line(event: &TransferEvent) -> String {
    let mut line = format!(
        "[{}] [{}] {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.client_ip.as_deref().unwrap_or(NO_CLIENT_IP),
        event.action.as_str()
    );
    if !event.details.is_empty() {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        line.push_str(" | ");
        line.push_str(&details);
    }
    line
}

async fn open_log(path: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn run_writer(path: PathBuf, mut rx: mpsc::Receiver<TransferEvent>) {
    let mut file = match open_log(&path).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Audit log unavailable");
            None
        }
    };

    while let Some(event) = rx.recv().await {
        let mut line = format_line(&event);
        line.push('\n');

        // Retry opening on each event so a transient failure heals itself
        if file.is_none() {
            file = open_log(&path).await.ok();
        }
        let Some(f) = file.as_mut() else {
            tracing::warn!(action = event.action.as_str(), "Audit event dropped");
            continue;
        };
        if let Err(e) = f.write_all(line.as_bytes()).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to append audit event");
            file = None;
        }
    }

    if let Some(mut f) = file {
        let _ = f.flush().await;
    }
    tracing::debug!("Audit writer finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropcode_core::TransferAction;
    use tempfile::tempdir;

    #[test]
    fn test_format_line() {
        let event = TransferEvent::new(TransferAction::FileDownloaded)
            .with_client_ip(Some("203.0.113.7".to_string()))
            .with("code", "AB3456")
            .with("file", "a/b.txt");
        let line = format_line(&event);

        assert!(line.starts_with('['));
        assert!(line.contains("] [203.0.113.7] FILE_DOWNLOADED | "));
        assert!(line.ends_with(r#"{"code":"AB3456","file":"a/b.txt"}"#));
    }

    #[test]
    fn test_format_line_without_ip_or_details() {
        let line = format_line(&TransferEvent::new(TransferAction::CodeGenerated));
        assert!(line.ends_with("] [-] CODE_GENERATED"));
    }

    #[tokio::test]
    async fn test_events_appended_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("system.log");
        let (logger, handle) = AuditLogger::spawn(&path);

        logger.emit(TransferEvent::new(TransferAction::SessionCreated).with("code", "AB3456"));
        logger.emit(
            TransferEvent::new(TransferAction::DeleteFailed)
                .with("code", "AB3456")
                .with_failure("disk full"),
        );
        drop(logger);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("SESSION_CREATED"));
        assert!(lines[1].contains("DELETE_FAILED"));
        assert!(lines[1].contains("disk full"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_growing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system.log");
        let (logger, handle) = AuditLogger::spawn_with_capacity(&path, 2);

        // The writer cannot run until this task yields, so the third event finds the queue full.
        for code in ["AAAAAA", "BBBBBB", "CCCCCC"] {
            logger.emit(TransferEvent::new(TransferAction::SessionCreated).with("code", code));
        }
        drop(logger);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("AAAAAA"));
        assert!(contents.contains("BBBBBB"));
        assert!(!contents.contains("CCCCCC"));
    }
}
