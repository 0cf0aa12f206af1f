//! Dropcode Core Library
//!
//! This crate provides the domain models, error types, configuration and
//! event hooks shared by every Dropcode component.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod format;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, TransferConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use events::{EventSink, NoOpEventSink, TransferAction, TransferEvent};
pub use format::format_file_size;
pub use models::{FileCategory, FileRecord, TransferCode, TransferSession};
