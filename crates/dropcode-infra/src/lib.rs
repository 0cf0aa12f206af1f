//! Dropcode infrastructure
//!
//! Process-level plumbing shared by the binaries:
//! - Tracing initialization
//! - Append-only audit log (the production `EventSink`)
//! - HTTP middleware (request id, security headers)
//! - The JSON error body

pub mod audit;
pub mod error;
pub mod middleware;
pub mod telemetry;

pub use audit::{format_line, AuditLogger};
pub use error::ErrorResponse;
pub use middleware::{
    request_id_middleware, security_headers_middleware, RequestId, SecurityHeaders,
    REQUEST_ID_HEADER,
};
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
