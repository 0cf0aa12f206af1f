use std::io::Cursor;

use dropcode_core::{AppError, FileCategory, TransferCode};
use dropcode_services::{
    MimeResolver, StoreConfig, TransferService, TransferStore, TransportError, UploadCandidate,
    UploadValidator, ValidationConfig,
};
use futures::future::join_all;
use image::{ImageBuffer, ImageFormat, Rgb};
use tempfile::{tempdir, TempDir};

/// A noisy 24x24 RGB PNG, roughly 2 KB
fn photo_png() -> Vec<u8> {
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

async fn service() -> (TransferService, TempDir) {
    let dir = tempdir().unwrap();
    let store = TransferStore::open(StoreConfig::new(dir.path())).await.unwrap();
    let service = TransferService::new(
        store,
        UploadValidator::new(ValidationConfig::default()),
        MimeResolver::with_system_table(None),
    );
    (service, dir)
}

fn code(s: &str) -> TransferCode {
    TransferCode::parse(s).unwrap()
}

#[tokio::test]
async fn test_mixed_batch_admits_valid_and_reports_blocked() {
    let (service, dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let png = photo_png();
    let outcome = service
        .upload_batch(
            &c,
            vec![
                UploadCandidate::new("photo.png", png.clone()),
                UploadCandidate::new("virus.exe", b"MZ\x90\x00".to_vec()),
            ],
        )
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.uploaded, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].file, "virus.exe");
    assert_eq!(outcome.errors[0].reason, "extension_blocked");

    let session = service.get_session(&c).await.unwrap();
    assert_eq!(session.files.len(), 1);
    let record = &session.files[0];
    assert_eq!(record.original_name, "photo.png");
    assert_eq!(record.mime_type, "image/png");
    assert_eq!(record.category, FileCategory::Image);
    assert_eq!(record.icon, "fa-file-image");
    assert_eq!(record.size, png.len() as u64);

    let on_disk = std::fs::read(dir.path().join("uploads/AB3456").join(&record.name)).unwrap();
    assert_eq!(on_disk, png);
}

#[tokio::test]
async fn test_batch_creates_session_on_first_upload() {
    let (service, _dir) = service().await;
    let c = code("hj5k7m");

    let outcome = service
        .upload_batch(&c, vec![UploadCandidate::new("notes.txt", b"hi".to_vec())])
        .await
        .unwrap();

    assert_eq!(outcome.uploaded, 1);
    assert_eq!(service.get_session(&c).await.unwrap().code.as_str(), "HJ5K7M");
}

#[tokio::test]
async fn test_batch_with_nothing_admitted_is_failure() {
    let (service, _dir) = service().await;
    let c = code("AB3456");

    let outcome = service
        .upload_batch(
            &c,
            vec![
                UploadCandidate::new("broken.jpg", b"not a jpeg".to_vec()),
                UploadCandidate::failed("big.zip", TransportError::ExceedsTransportLimit),
            ],
        )
        .await
        .unwrap();

    assert!(!outcome.is_success());
    let reasons: Vec<&str> = outcome.errors.iter().map(|e| e.reason.as_str()).collect();
    assert_eq!(reasons, vec!["corrupted_image", "transport_error"]);
    assert!(service.get_session(&c).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_double_extension_script_rejected() {
    let (service, _dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let err = service
        .add_file(&c, "report.pdf.php", b"%PDF-1.4".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ValidationFailed { code: "extension_blocked", .. }
    ));
}

#[tokio::test]
async fn test_script_in_middle_of_name_is_stripped() {
    let (service, _dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let record = service.add_file(&c, "shell.php.jpg", photo_png()).await.unwrap();
    assert!(record.name.starts_with("shell_"));
    assert!(record.name.ends_with(".jpg"));
    assert!(!record.name.contains("php"));
    assert_eq!(record.original_name, "shell.php.jpg");
}

#[tokio::test]
async fn test_add_file_requires_session() {
    let (service, _dir) = service().await;
    let err = service
        .add_file(&code("AB3456"), "notes.txt", b"x".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_image_too_large_to_decode_is_rejected() {
    let (service, dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let tall = ImageBuffer::from_pixel(1, 9000, Rgb([0u8, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    tall.write_to(&mut out, ImageFormat::Png).unwrap();

    let err = service
        .add_file(&c, "poster.png", out.into_inner())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed { code: "corrupted_image", .. }));
    assert!(service.get_session(&c).await.unwrap().files.is_empty());
    assert_eq!(std::fs::read_dir(dir.path().join("uploads/AB3456")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_same_name_twice_gets_distinct_storage_names() {
    let (service, _dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let a = service.add_file(&c, "notes.txt", b"one".to_vec()).await.unwrap();
    let b = service.add_file(&c, "notes.txt", b"two".to_vec()).await.unwrap();
    assert_ne!(a.name, b.name);
    assert_eq!(service.get_session(&c).await.unwrap().files.len(), 2);
}

#[tokio::test]
async fn test_remove_errors_distinguish_session_and_file() {
    let (service, _dir) = service().await;
    let c = code("AB3456");

    let err = service.remove_file(&c, "nope.txt").await.unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound(_)));

    service.create_session(&c).await.unwrap();
    let err = service.remove_file(&c, "nope.txt").await.unwrap_err();
    assert!(matches!(err, AppError::FileNotFound(_)));
}

#[tokio::test]
async fn test_delete_session_with_three_files() {
    let (service, dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();
    for name in ["a.txt", "b.csv", "c.md"] {
        service.add_file(&c, name, b"content".to_vec()).await.unwrap();
    }

    service.delete_session(&c).await.unwrap();

    assert!(!dir.path().join("uploads/AB3456").exists());
    assert!(service.get_session(&c).await.is_none());
}

#[tokio::test]
async fn test_concurrent_batches_to_fresh_code() {
    let (service, _dir) = service().await;
    let c = code("NP4R6T");

    let batches = ["left.txt", "right.txt"].into_iter().map(|name| {
        let service = service.clone();
        let c = c.clone();
        async move {
            service
                .upload_batch(&c, vec![UploadCandidate::new(name, b"x".to_vec())])
                .await
        }
    });
    for outcome in join_all(batches).await {
        assert_eq!(outcome.unwrap().uploaded, 1);
    }

    let originals: Vec<String> = service
        .get_session(&c)
        .await
        .unwrap()
        .files
        .into_iter()
        .map(|f| f.original_name)
        .collect();
    assert_eq!(originals.len(), 2);
    assert!(originals.contains(&"left.txt".to_string()));
    assert!(originals.contains(&"right.txt".to_string()));
}

#[tokio::test]
async fn test_archive_of_transfer() {
    let (service, _dir) = service().await;
    let c = code("AB3456");
    service.create_session(&c).await.unwrap();

    let empty = service.build_archive(&c).await.unwrap_err();
    assert!(matches!(empty, AppError::FileNotFound(_)));

    service.add_file(&c, "a.txt", b"1".to_vec()).await.unwrap();
    service.add_file(&c, "a.txt", b"2".to_vec()).await.unwrap();

    let archive = service.build_archive(&c).await.unwrap();
    assert_eq!(archive.file_name, "files_AB3456.zip");
    assert_eq!(archive.file_count, 2);
    assert_eq!(&archive.data[..2], b"PK");
}

#[tokio::test]
async fn test_generated_code_is_live_session() {
    let (service, _dir) = service().await;
    let c = service.generate_code().await.unwrap();
    assert!(TransferCode::is_well_formed(c.as_str()));
    assert!(service.get_session(&c).await.unwrap().is_empty());
}
