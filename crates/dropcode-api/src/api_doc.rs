//! OpenAPI documentation, served at `/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::handlers;
use dropcode_core::models;
use dropcode_infra::ErrorResponse;
use dropcode_services::{BatchOutcome, FileError};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dropcode API",
        version = "0.1.0",
        description = "Share files under a short code. A sender uploads files to a six-character transfer code; a receiver lists and downloads them with the same code."
    ),
    paths(
        handlers::codes::generate_code,
        handlers::upload::upload_files,
        handlers::transfers::get_transfer,
        handlers::transfers::delete_transfer,
        handlers::files::download_file,
        handlers::files::delete_file,
        handlers::archive::download_archive,
        handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        BatchOutcome,
        FileError,
        models::TransferCode,
        models::FileRecord,
        models::FileCategory,
        handlers::codes::GeneratedCode,
        handlers::transfers::TransferView,
        handlers::transfers::FileView,
        handlers::transfers::DeletedTransfer,
        handlers::health::HealthCheckResponse,
    )),
    tags(
        (name = "transfers", description = "Code allocation, upload, listing, download and removal"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
