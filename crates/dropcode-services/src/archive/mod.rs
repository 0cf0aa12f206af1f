pub mod service;

pub use service::{create_zip_archive, unique_entry_name, ArchiveEntry};
