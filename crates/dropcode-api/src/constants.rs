//! API-wide constants

/// Prefix of every transfer endpoint
pub const API_PREFIX: &str = "/api";

/// Multipart field carrying uploaded files (`files[]` is accepted too)
pub const UPLOAD_FIELD: &str = "files";

/// Upper bound on concurrently served requests
pub const HTTP_CONCURRENCY_LIMIT: usize = 1_024;
