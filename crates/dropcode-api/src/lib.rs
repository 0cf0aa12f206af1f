//! Dropcode API Library
//!
//! HTTP handlers, extractors and application setup for the transfer service.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod utils;

pub use api_doc::ApiDoc;
pub use error::{ApiResponse, HttpAppError};
pub use state::AppState;
