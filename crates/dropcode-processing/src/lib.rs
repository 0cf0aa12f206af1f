//! Dropcode upload processing
//!
//! Everything that happens to an upload before it reaches the transfer
//! store: admission checks, storage-name sanitization, content type
//! resolution and display classification.

pub mod classify;
pub mod mime;
pub mod sanitizer;
pub mod validator;

pub use classify::{category_for, icon_for};
pub use mime::{MimeResolver, SystemMimeTable};
pub use sanitizer::{base_name, extension_of, sanitize_filename};
pub use validator::{
    TransportError, UploadCandidate, UploadValidator, ValidationConfig, ValidationError,
};
