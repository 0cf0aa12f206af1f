use std::collections::HashSet;
use std::io::Cursor;

use dropcode_core::constants::{
    CONTENT_SNIFF_BYTES, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_BLOCKED_EXTENSIONS,
};
use dropcode_core::{format_file_size, AppError, Config};
use image::{ImageReader, Limits};

use crate::sanitizer::{base_name, extension_of};

/// Extensions that must parse as an image before admission.
const RASTER_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "ico", "tiff", "tif",
];

/// Largest width or height the integrity check will decode
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Decoder allocation ceiling for the integrity check
pub const MAX_IMAGE_DECODE_BYTES: u64 = 256 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_IMAGE_DECODE_BYTES);
    limits
}

/// Failure reported by the transport before the content was fully received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Body exceeded the transport's own size limit
    ExceedsTransportLimit,
    Partial,
    NoFile,
    NoTempDir,
    WriteFailed,
    Interrupted,
}

impl TransportError {
    pub fn describe(&self) -> &'static str {
        match self {
            TransportError::ExceedsTransportLimit => "exceeds the server upload limit",
            TransportError::Partial => "was only partially uploaded",
            TransportError::NoFile => "was not received",
            TransportError::NoTempDir => "could not be buffered (no temporary directory)",
            TransportError::WriteFailed => "could not be written to disk",
            TransportError::Interrupted => "upload was interrupted",
        }
    }
}

/// Reasons a candidate upload is refused
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Error uploading {name}: {}", .kind.describe())]
    Transport { name: String, kind: TransportError },

    #[error("{name} exceeds the {} limit", limit_text(.max))]
    SizeExceeded { name: String, size: u64, max: u64 },

    #[error("{name}: file type .{extension} not allowed for security reasons")]
    ExtensionBlocked { name: String, extension: String },

    #[error("{name}: file type not supported")]
    ExtensionUnsupported { name: String, extension: String },

    #[error("{name}: invalid or corrupted image file")]
    CorruptedImage { name: String },

    #[error("{name}: file contains potentially dangerous content")]
    DangerousContent { name: String },
}

fn limit_text(max: &u64) -> String {
    format_file_size(*max)
}

impl ValidationError {
    /// Stable machine-readable sub-reason
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Transport { .. } => "transport_error",
            ValidationError::SizeExceeded { .. } => "size_exceeded",
            ValidationError::ExtensionBlocked { .. } => "extension_blocked",
            ValidationError::ExtensionUnsupported { .. } => "extension_unsupported",
            ValidationError::CorruptedImage { .. } => "corrupted_image",
            ValidationError::DangerousContent { .. } => "dangerous_content",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationFailed {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// One file offered for admission
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub original_name: String,
    pub data: Vec<u8>,
    /// Size claimed by the client, if the transport reported one
    pub declared_size: Option<u64>,
    pub transport_error: Option<TransportError>,
}

impl UploadCandidate {
    pub fn new(original_name: impl Into<String>, data: Vec<u8>) -> Self {
        let declared_size = Some(data.len() as u64);
        Self {
            original_name: original_name.into(),
            data,
            declared_size,
            transport_error: None,
        }
    }

    /// Candidate for a file the transport failed to deliver
    pub fn failed(original_name: impl Into<String>, kind: TransportError) -> Self {
        Self {
            original_name: original_name.into(),
            data: Vec::new(),
            declared_size: None,
            transport_error: Some(kind),
        }
    }

    /// Name for messages: the base name only, never a client path
    pub fn display_name(&self) -> &str {
        base_name(&self.original_name)
    }
}

/// Upload policy
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_file_size_bytes: u64,
    pub allowed_extensions: HashSet<String>,
    pub blocked_extensions: HashSet<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            blocked_extensions: DEFAULT_BLOCKED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&Config> for ValidationConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            allowed_extensions: config.allowed_extensions().clone(),
            blocked_extensions: config.blocked_extensions().clone(),
        }
    }
}

/// Decides whether a candidate may enter the store
///
/// Checks run in a fixed order and the first failure wins: transport error,
/// size, blocklist, allow-list, image integrity, embedded script tags. An
/// extension on neither list is refused.
pub struct UploadValidator {
    config: ValidationConfig,
}

impl UploadValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        let name = candidate.display_name().to_string();

        if let Some(kind) = candidate.transport_error {
            return Err(ValidationError::Transport { name, kind });
        }

        self.validate_size(&name, candidate)?;

        let extension = extension_of(&candidate.original_name);
        self.validate_extension(&name, &extension)?;

        if RASTER_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            validate_raster_image(&name, &candidate.data)?;
        } else if extension == "svg" {
            validate_svg(&name, &candidate.data)?;
        }

        validate_content(&name, &candidate.data)
    }

    fn validate_size(&self, name: &str, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        let actual = candidate.data.len() as u64;
        let size = candidate.declared_size.unwrap_or(actual).max(actual);
        if size > self.config.max_file_size_bytes {
            return Err(ValidationError::SizeExceeded {
                name: name.to_string(),
                size,
                max: self.config.max_file_size_bytes,
            });
        }
        Ok(())
    }

    fn validate_extension(&self, name: &str, extension: &str) -> Result<(), ValidationError> {
        if self.config.blocked_extensions.contains(extension) {
            return Err(ValidationError::ExtensionBlocked {
                name: name.to_string(),
                extension: extension.to_string(),
            });
        }
        if !self.config.allowed_extensions.contains(extension) {
            return Err(ValidationError::ExtensionUnsupported {
                name: name.to_string(),
                extension: extension.to_string(),
            });
        }
        Ok(())
    }
}

fn validate_raster_image(name: &str, data: &[u8]) -> Result<(), ValidationError> {
    let corrupted = || ValidationError::CorruptedImage {
        name: name.to_string(),
    };

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| corrupted())?;
    if reader.format().is_none() {
        return Err(corrupted());
    }
    reader.limits(decode_limits());

    let image = reader.decode().map_err(|e| {
        tracing::debug!(file = %name, error = %e, "Image failed to decode");
        corrupted()
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(corrupted());
    }
    Ok(())
}

fn sniff_prefix(data: &[u8]) -> String {
    let prefix = &data[..data.len().min(CONTENT_SNIFF_BYTES)];
    String::from_utf8_lossy(prefix).to_ascii_lowercase()
}

fn validate_svg(name: &str, data: &[u8]) -> Result<(), ValidationError> {
    if sniff_prefix(data).contains("<svg") {
        Ok(())
    } else {
        Err(ValidationError::CorruptedImage {
            name: name.to_string(),
        })
    }
}

fn validate_content(name: &str, data: &[u8]) -> Result<(), ValidationError> {
    let prefix = sniff_prefix(data);
    if prefix.contains("<?php") || prefix.contains("<?=") {
        tracing::warn!(file = %name, "Upload carries an embedded server-side script tag");
        return Err(ValidationError::DangerousContent {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_fn(16, 16, |x, y| Rgb([(x * 15) as u8, (y * 15) as u8, ((x * y) % 256) as u8]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn validator() -> UploadValidator {
        UploadValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_accepts_valid_png() {
        let candidate = UploadCandidate::new("photo.png", png_bytes());
        assert!(validator().validate(&candidate).is_ok());
    }

    #[test]
    fn test_accepts_plain_text() {
        let candidate = UploadCandidate::new("notes.txt", b"hello there".to_vec());
        assert!(validator().validate(&candidate).is_ok());
    }

    #[test]
    fn test_transport_error_checked_first() {
        let candidate = UploadCandidate::failed("virus.exe", TransportError::Partial);
        let err = validator().validate(&candidate).unwrap_err();
        assert_eq!(err.code(), "transport_error");
        assert!(err.to_string().contains("partially"));
    }

    #[test]
    fn test_declared_size_over_limit() {
        let mut candidate = UploadCandidate::new("notes.txt", b"small".to_vec());
        candidate.declared_size = Some(11 * 1024 * 1024);
        let err = validator().validate(&candidate).unwrap_err();
        assert_eq!(err.code(), "size_exceeded");
    }

    #[test]
    fn test_actual_size_over_limit_even_if_declared_small() {
        let config = ValidationConfig {
            max_file_size_bytes: 4,
            ..ValidationConfig::default()
        };
        let mut candidate = UploadCandidate::new("notes.txt", b"too long".to_vec());
        candidate.declared_size = Some(1);
        let err = UploadValidator::new(config).validate(&candidate).unwrap_err();
        assert_eq!(err.code(), "size_exceeded");
    }

    #[test]
    fn test_blocklist_wins_over_allow_list() {
        let mut config = ValidationConfig::default();
        config.allowed_extensions.insert("exe".to_string());
        let candidate = UploadCandidate::new("setup.EXE", b"MZ".to_vec());
        let err = UploadValidator::new(config).validate(&candidate).unwrap_err();
        assert_eq!(err.code(), "extension_blocked");

        let js = UploadCandidate::new("app.js", b"console.log(1)".to_vec());
        assert_eq!(validator().validate(&js).unwrap_err().code(), "extension_blocked");
    }

    #[test]
    fn test_unlisted_extension_denied() {
        let candidate = UploadCandidate::new("data.xyz", b"whatever".to_vec());
        let err = validator().validate(&candidate).unwrap_err();
        assert_eq!(err.code(), "extension_unsupported");

        let bare = UploadCandidate::new("Makefile", b"all:".to_vec());
        assert_eq!(validator().validate(&bare).unwrap_err().code(), "extension_unsupported");
    }

    #[test]
    fn test_double_extension_rejected_on_last_extension() {
        let candidate = UploadCandidate::new("report.pdf.php", b"%PDF-1.4".to_vec());
        assert_eq!(validator().validate(&candidate).unwrap_err().code(), "extension_blocked");
    }

    #[test]
    fn test_non_image_with_image_extension() {
        let candidate = UploadCandidate::new("cat.jpg", b"definitely not a jpeg".to_vec());
        assert_eq!(validator().validate(&candidate).unwrap_err().code(), "corrupted_image");
    }

    #[test]
    fn test_truncated_png_rejected() {
        let mut bytes = png_bytes();
        bytes.truncate(bytes.len() / 2);
        let candidate = UploadCandidate::new("half.png", bytes);
        assert_eq!(validator().validate(&candidate).unwrap_err().code(), "corrupted_image");
    }

    #[test]
    fn test_oversized_image_dimensions_rejected() {
        let wide = ImageBuffer::from_pixel(MAX_IMAGE_DIMENSION + 1, 1, Rgb([0u8, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        wide.write_to(&mut out, ImageFormat::Png).unwrap();

        let candidate = UploadCandidate::new("banner.png", out.into_inner());
        assert!(candidate.data.len() < 1024 * 1024);
        assert_eq!(validator().validate(&candidate).unwrap_err().code(), "corrupted_image");
    }

    #[test]
    fn test_image_at_dimension_limit_accepted() {
        let edge = ImageBuffer::from_pixel(MAX_IMAGE_DIMENSION, 1, Rgb([10u8, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        edge.write_to(&mut out, ImageFormat::Png).unwrap();

        let candidate = UploadCandidate::new("strip.png", out.into_inner());
        assert!(validator().validate(&candidate).is_ok());
    }

    #[test]
    fn test_svg_needs_svg_element() {
        let good = UploadCandidate::new(
            "logo.svg",
            br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"></svg>"#.to_vec(),
        );
        let bad = UploadCandidate::new("logo.svg", b"plain text".to_vec());

        assert!(validator().validate(&good).is_ok());
        assert_eq!(validator().validate(&bad).unwrap_err().code(), "corrupted_image");
    }

    #[test]
    fn test_php_tag_in_prefix_rejected() {
        let upper = UploadCandidate::new("readme.txt", b"hi <?PHP system($_GET['c']); ?>".to_vec());
        let short = UploadCandidate::new("page.html", b"<p><?= $x ?></p>".to_vec());

        assert_eq!(validator().validate(&upper).unwrap_err().code(), "dangerous_content");
        assert_eq!(validator().validate(&short).unwrap_err().code(), "dangerous_content");
    }

    #[test]
    fn test_php_tag_beyond_prefix_ignored() {
        let mut data = vec![b'a'; CONTENT_SNIFF_BYTES];
        data.extend_from_slice(b"<?php");
        let candidate = UploadCandidate::new("long.txt", data);
        assert!(validator().validate(&candidate).is_ok());
    }

    #[test]
    fn test_converts_to_app_error_with_code() {
        let err: AppError = ValidationError::CorruptedImage {
            name: "x.png".to_string(),
        }
        .into();
        match err {
            AppError::ValidationFailed { code, .. } => assert_eq!(code, "corrupted_image"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
