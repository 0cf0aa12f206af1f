//! Test helpers: build the router over a temporary data directory.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use dropcode_api::setup::{routes, services};
use dropcode_core::{Config, EventSink, TransferAction, TransferConfig, TransferEvent};
use image::{ImageBuffer, ImageFormat, Rgb};
use tempfile::TempDir;

/// Captures every event so tests can inspect the audit trail
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingSink {
    pub fn actions(&self) -> Vec<TransferAction> {
        self.events.lock().unwrap().iter().map(|e| e.action).collect()
    }

    pub fn find(&self, action: TransferAction) -> Vec<TransferEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TransferEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub events: Arc<RecordingSink>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn session_dir(&self, code: &str) -> std::path::PathBuf {
        self.dir.path().join("uploads").join(code)
    }
}

pub async fn setup_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Config(Box::new(TransferConfig::with_data_dir(dir.path())));
    let events = Arc::new(RecordingSink::default());

    let state = services::build_state(&config, events.clone()).await.unwrap();
    let router = routes::setup_routes(&config, state).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        events,
        dir,
    }
}

/// A noisy 24x24 RGB PNG, roughly 2 KB
pub fn photo_png() -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = ImageBuffer::from_fn(24, 24, |_, _| {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let b = seed.to_be_bytes();
        Rgb([b[0], b[1], b[2]])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Multipart body with one `files` part per `(name, bytes)`
pub fn files_form(files: Vec<(&str, Vec<u8>)>) -> MultipartForm {
    files
        .into_iter()
        .fold(MultipartForm::new(), |form, (name, data)| {
            form.add_part(
                "files",
                Part::bytes(data)
                    .file_name(name.to_string())
                    .mime_type("application/octet-stream"),
            )
        })
}
