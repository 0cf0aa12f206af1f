pub mod code;
pub mod transfer;

pub use code::TransferCode;
pub use transfer::{FileCategory, FileRecord, TransferSession};
