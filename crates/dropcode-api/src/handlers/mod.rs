pub mod archive;
pub mod codes;
pub mod files;
pub mod health;
pub mod transfers;
pub mod upload;

use dropcode_core::{AppError, TransferCode};

/// Parse the `{code}` path segment
pub(crate) fn parse_code(raw: &str) -> Result<TransferCode, AppError> {
    TransferCode::parse(raw)
}
