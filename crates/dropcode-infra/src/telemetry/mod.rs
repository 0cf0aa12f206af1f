//! Tracing initialization

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat};
