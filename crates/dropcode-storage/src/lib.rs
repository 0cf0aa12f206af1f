//! Dropcode transfer store
//!
//! Code-addressed session metadata kept in one JSON document, plus the
//! per-session upload directories it describes. See [`TransferStore`].

pub mod document;
pub mod error;
pub mod layout;
pub mod reconcile;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use layout::StoreConfig;
pub use reconcile::ReconcileReport;
pub use store::{AdmittedFile, TransferStore};
