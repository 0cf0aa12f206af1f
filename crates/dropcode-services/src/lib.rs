//! Dropcode Services Layer
//!
//! Business operations over the transfer store: code allocation, validated
//! uploads, removals and bulk download packaging. The API crate depends on
//! [`TransferService`] and nothing below it.

pub mod archive;
pub mod code_generator;
pub mod transfer;

pub use archive::{create_zip_archive, ArchiveEntry};
pub use code_generator::generate_code;
pub use dropcode_processing::{
    MimeResolver, TransportError, UploadCandidate, UploadValidator, ValidationConfig,
};
pub use dropcode_storage::{StoreConfig, TransferStore};
pub use transfer::{BatchOutcome, FileError, TransferArchive, TransferService};
